// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 负责将从 TCP 流中读取的原始字节解析为强类型的 `Request` 结构体：
//! 1. 请求行（Request-Line）的解析（方法、路径、查询串、版本）。
//! 2. 请求头（Headers）按原样保存，查询时大小写不敏感。
//! 3. 请求头之后的全部字节作为请求体保存，供参数绑定与文件上传使用。

use crate::{exception::Exception, param::*};
use bytes::Bytes;
use log::error;

/// 请求头与请求体之间的分隔符
const HEADER_END: &[u8] = b"\r\n\r\n";

/// 一个完整的 HTTP 请求。
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// 全局请求 ID，用于在日志中追踪请求
    id: u128,
    method: HttpRequestMethod,
    /// 百分号解码后、不含查询串的请求路径
    path: String,
    /// `?` 之后的原始查询串
    query: Option<String>,
    version: HttpVersion,
    /// 按到达顺序保存的请求头
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl Request {
    /// 构建一个没有请求头和请求体的请求，`target` 可以带查询串。
    /// 路径中无法解码为 UTF-8 的字节以替换字符代替。
    pub fn new(method: HttpRequestMethod, target: &str, id: u128) -> Self {
        let (path, query) = split_target(target);
        let path = urlencoding::decode_binary(path.as_bytes());
        let path = String::from_utf8_lossy(&path).into_owned();
        Self {
            id,
            method,
            path,
            query,
            version: HttpVersion::V1_1,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 定位请求头结束位置，请求头必须是合法的 UTF-8。
    /// 2. 解析请求行：方法、目标路径和协议版本，路径只做一次百分号解码。
    /// 3. 逐行解析 `名称: 值` 形式的请求头。
    /// 4. 其余字节作为请求体。
    ///
    /// 调用方负责保证缓冲区中已经包含完整的请求体（见 `server::read_request`）。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let (head, body) = match find_header_end(buffer) {
            Some(pos) => (&buffer[..pos], &buffer[pos + HEADER_END.len()..]),
            None => (buffer, &buffer[buffer.len()..]),
        };

        let request_string = match std::str::from_utf8(head) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut request_lines = request_string.split(CRLF);

        // 请求行 (e.g., "POST /api/account/login HTTP/1.1")
        let first_line = request_lines.next().unwrap_or_default();
        let first_line_parts: Vec<&str> =
            first_line.split(' ').filter(|p| !p.is_empty()).collect();
        if first_line_parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, first_line);
            return Err(Exception::MalformedRequest);
        }

        let method = match HttpRequestMethod::parse(first_line_parts[0]) {
            Some(m) => m,
            None => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, first_line_parts[0]);
                return Err(Exception::UnSupportedRequestMethod);
            }
        };

        let version_str = first_line_parts[first_line_parts.len() - 1].to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            "HTTP/1.0" => HttpVersion::V1_0,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // 路径中可能包含空格，虽然不规范但通过 join 尝试恢复
        let target = first_line_parts[1..first_line_parts.len() - 1].join(" ");
        let (path, query) = split_target(&target);
        let path = match urlencoding::decode(&path) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => {
                error!("[ID{}]请求路径解码后不是合法的UTF-8：{}", id, path);
                return Err(Exception::MalformedRequest);
            }
        };

        let mut headers = Vec::new();
        for line in request_lines {
            if line.is_empty() {
                continue;
            }
            match line.split_once(':') {
                Some((name, value)) => {
                    headers.push((name.trim().to_string(), value.trim().to_string()));
                }
                None => {
                    error!("[ID{}]无法解析的请求头：{}", id, line);
                    return Err(Exception::MalformedRequest);
                }
            }
        }

        Ok(Self {
            id,
            method,
            path,
            query,
            version,
            headers,
            body: Bytes::copy_from_slice(body),
        })
    }
}

/// 返回 `\r\n\r\n` 在缓冲区中的起始位置。
pub fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEADER_END.len())
        .position(|window| window == HEADER_END)
}

fn split_target(target: &str) -> (String, Option<String>) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (target.to_string(), None),
    }
}

// --- Getter 访问器实现 ---

impl Request {
    pub fn id(&self) -> u128 {
        self.id
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 获取请求路径（不含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    /// 按名称查找请求头，大小写不敏感，重复的请求头返回第一个。
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length").and_then(|v| v.parse().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    pub fn user_agent(&self) -> &str {
        self.header("User-Agent").unwrap_or_default()
    }

    /// 读取查询串中的表单值，值已做 URL 解码；键不存在时返回 `None`。
    pub fn query(&self, key: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
        pairs.into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 验证常规 GET 请求的解析，包括 Path 和 Headers
    #[test]
    fn test_parse_get_request() {
        let request_str =
            "GET / HTTP/1.1\r\nHost: localhost:7878\r\nUser-Agent: Test-Browser\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Get);
        assert_eq!(request.path(), "/");
        assert_eq!(request.user_agent(), "Test-Browser");
        assert_eq!(request.header("host"), Some("localhost:7878"));
        assert!(request.body().is_empty());
    }

    /// 验证 POST 请求体被完整保存
    #[test]
    fn test_parse_post_request_with_body() {
        let request_str = "POST /api/account/login HTTP/1.1\r\n\
            Host: localhost:7878\r\n\
            Content-Type: application/json\r\n\
            Content-Length: 23\r\n\r\n\
            {\"user\":\"a\",\"pass\":\"b\"}";
        let request = Request::try_from(request_str.as_bytes(), 7).unwrap();

        assert_eq!(request.id(), 7);
        assert_eq!(request.method(), HttpRequestMethod::Post);
        assert_eq!(request.path(), "/api/account/login");
        assert_eq!(request.content_length(), Some(23));
        assert_eq!(request.content_type(), Some("application/json"));
        assert_eq!(&request.body()[..], b"{\"user\":\"a\",\"pass\":\"b\"}");
    }

    /// 验证 OPTIONS 请求（常用于 CORS 预检）
    #[test]
    fn test_parse_options_request() {
        let request_str =
            "OPTIONS /api/account/login HTTP/1.1\r\nAccess-Control-Request-Method: POST\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Options);
        assert_eq!(request.header("access-control-request-method"), Some("POST"));
    }

    #[test]
    fn test_extended_methods() {
        for (line, method) in [
            ("DELETE /r HTTP/1.1", HttpRequestMethod::Delete),
            ("PUT /r HTTP/1.1", HttpRequestMethod::Put),
            ("PROPFIND /r HTTP/1.1", HttpRequestMethod::Propfind),
        ] {
            let buffer = format!("{}\r\n\r\n", line);
            let request = Request::try_from(buffer.as_bytes(), 0).unwrap();
            assert_eq!(request.method(), method);
        }
    }

    /// 确保无法识别的 HTTP 方法会返回错误
    #[test]
    fn test_unsupported_method() {
        let result = Request::try_from(b"BREW /pot HTTP/1.1\r\n\r\n", 0);
        assert_eq!(result.unwrap_err(), Exception::UnSupportedRequestMethod);
    }

    /// 确保不支持的版本（如 HTTP/2.0）被正确拒绝
    #[test]
    fn test_unsupported_http_version() {
        let result = Request::try_from(b"GET / HTTP/2.0\r\nHost: localhost:7878\r\n\r\n", 0);
        assert_eq!(result.unwrap_err(), Exception::UnsupportedHttpVersion);
    }

    #[test]
    fn test_invalid_utf8() {
        let result = Request::try_from(&[0xFF, 0xFE, 0xFD], 0);
        assert_eq!(result.unwrap_err(), Exception::RequestIsNotUtf8);
    }

    #[test]
    fn test_truncated_request_line() {
        let result = Request::try_from(b"GET /\r\n\r\n", 0);
        assert_eq!(result.unwrap_err(), Exception::MalformedRequest);
    }

    /// 请求体不是 UTF-8 时依然可以解析（例如上传的二进制文件）
    #[test]
    fn test_binary_body() {
        let mut buffer = b"POST /upload/x HTTP/1.1\r\nContent-Length: 3\r\n\r\n".to_vec();
        buffer.extend_from_slice(&[0xFF, 0x00, 0xFE]);
        let request = Request::try_from(&buffer, 0).unwrap();
        assert_eq!(&request.body()[..], &[0xFF, 0x00, 0xFE]);
    }

    /// 确保带查询参数的路径被拆分，且查询值经过解码
    #[test]
    fn test_path_with_query_string() {
        let buffer = b"GET /api/account/profile?id=123&name=a%20b HTTP/1.1\r\n\r\n";
        let request = Request::try_from(buffer, 0).unwrap();

        assert_eq!(request.path(), "/api/account/profile");
        assert_eq!(request.query_string(), Some("id=123&name=a%20b"));
        assert_eq!(request.query("name"), Some("a b".to_string()));
        assert_eq!(request.query("missing"), None);
    }

    /// 路径做一次百分号解码，查询串保持原样
    #[test]
    fn test_path_is_percent_decoded_once() {
        let buffer = b"GET /www/a%20b/%E4%B8%AD.txt?q=%2e%2e HTTP/1.1\r\n\r\n";
        let request = Request::try_from(buffer, 0).unwrap();
        assert_eq!(request.path(), "/www/a b/\u{4e2d}.txt");
        assert_eq!(request.query_string(), Some("q=%2e%2e"));

        let request = Request::try_from(b"GET /www/%252e%252e HTTP/1.1\r\n\r\n", 0).unwrap();
        assert_eq!(request.path(), "/www/%2e%2e");

        let request = Request::try_from(b"GET /www/%2e%2e%2fsecret HTTP/1.1\r\n\r\n", 0).unwrap();
        assert_eq!(request.path(), "/www/../secret");
    }

    #[test]
    fn test_path_decoding_to_invalid_utf8_is_rejected() {
        let result = Request::try_from(b"GET /www/%ff%fe HTTP/1.1\r\n\r\n", 0);
        assert_eq!(result.unwrap_err(), Exception::MalformedRequest);
    }

    #[test]
    fn test_lowercase_method() {
        let buffer = b"get / HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";
        let request = Request::try_from(buffer, 0).unwrap();
        assert_eq!(request.method(), HttpRequestMethod::Get);
    }

    #[test]
    fn test_builder() {
        let request = Request::new(HttpRequestMethod::Post, "/api/a/b?x=1", 3)
            .with_header("Origin", "http://localhost:4200")
            .with_body("{}");
        assert_eq!(request.path(), "/api/a/b");
        assert_eq!(request.query("x"), Some("1".to_string()));
        assert_eq!(Request::new(HttpRequestMethod::Get, "/a%20b", 0).path(), "/a b");
        assert_eq!(request.header("ORIGIN"), Some("http://localhost:4200"));
        assert_eq!(&request.body()[..], b"{}");
    }
}
