// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由器协议参数与常量模块
//!
//! 该模块定义了 `webrouter` 遵循的 HTTP 协议相关常量和数据结构，包括：
//! - 路由前缀、控制器命名约定、上传字段名等分发约定。
//! - 常见的 HTTP 状态码及其原因短语（Reason Phrase）。
//! - 静态资源使用的 MIME 类型映射表。
//! - HTTP 方法与版本的强类型枚举。

use lazy_static::lazy_static;
use std::collections::HashMap;

/// 静态资源根目录（相对于工作目录）
pub const STATIC_FOLDER: &str = "www";

/// 首页所在的项目子目录
pub const PROJECT_NAME: &str = "my-zone";

/// 首页文件名
pub const HOMEPAGE: &str = "index.html";

/// API 路由前缀，格式：/api/<controller>/<method>
pub const PREFIX_API: &str = "/api";

/// 静态资源路由前缀
pub const PREFIX_STATIC: &str = "/www";

/// 文件上传路由前缀
pub const PREFIX_UPLOAD: &str = "/upload";

/// 控制器类型名的约定后缀，生成路由时会被去掉
pub const SUFFIX_CONTROLLER: &str = "Controller";

/// multipart 表单中上传文件所在的字段名
pub const UPLOAD_FIELD: &str = "uploadfile";

/// 请求体在内存中的默认上限（32 MiB）
pub const MAX_MEMORY: usize = 32 << 20;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "webrouter";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

lazy_static! {
    /// HTTP 状态码与其对应的标准原因短语映射表。
    ///
    /// 参考标准：[RFC 9110: HTTP Semantics](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(100, "Continue");

        map.insert(200, "OK");
        map.insert(201, "Created");
        map.insert(204, "No Content");
        map.insert(206, "Partial Content");

        map.insert(301, "Moved Permanently");
        map.insert(302, "Found");
        map.insert(304, "Not Modified");

        map.insert(400, "Bad Request");
        map.insert(401, "Unauthorized");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(408, "Request Timeout");
        map.insert(411, "Length Required");
        map.insert(413, "Content Too Large");
        map.insert(414, "URI Too Long");
        map.insert(415, "Unsupported Media Type");
        map.insert(422, "Unprocessable Content");

        map.insert(500, "Internal Server Error");
        map.insert(501, "Not Implemented");
        map.insert(503, "Service Unavailable");
        map.insert(505, "HTTP Version Not Supported");
        map
    };
}

lazy_static! {
    /// 文件后缀名到 MIME 类型的映射表，用于 `/www` 下静态资源的 `Content-Type`。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        map.insert("bmp", "image/bmp");
        map.insert("css", "text/css;charset=utf-8");
        map.insert("csv", "text/csv");
        map.insert("gif", "image/gif");
        map.insert("gz", "application/gzip");
        map.insert("htm", "text/html;charset=utf-8");
        map.insert("html", "text/html;charset=utf-8");
        map.insert("ico", "image/x-icon");
        map.insert("jpg", "image/jpeg");
        map.insert("jpeg", "image/jpeg");
        map.insert("js", "text/javascript;charset=utf-8");
        map.insert("json", "application/json");
        map.insert("map", "application/json");
        map.insert("mjs", "text/javascript");
        map.insert("mp3", "audio/mpeg");
        map.insert("mp4", "video/mp4");
        map.insert("otf", "font/otf");
        map.insert("pdf", "application/pdf");
        map.insert("png", "image/png");
        map.insert("svg", "image/svg+xml");
        map.insert("ttf", "font/ttf");
        map.insert("txt", "text/plain;charset=utf-8");
        map.insert("wasm", "application/wasm");
        map.insert("webm", "video/webm");
        map.insert("webp", "image/webp");
        map.insert("woff", "font/woff");
        map.insert("woff2", "font/woff2");
        map.insert("xml", "text/xml");
        map.insert("zip", "application/zip");
        map
    };
}

/// 无法识别后缀时使用的兜底类型
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// 根据文件扩展名查找 MIME 类型，大小写不敏感。
pub fn mime_for(extension: &str) -> &'static str {
    MIME_TYPES
        .get(extension.to_ascii_lowercase().as_str())
        .copied()
        .unwrap_or(DEFAULT_MIME)
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum HttpVersion {
    V1_0,
    #[default]
    V1_1,
}

/// 标准 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpRequestMethod {
    Connect,
    Delete,
    #[default]
    Get,
    Head,
    Options,
    Patch,
    Post,
    /// WebDAV 属性查询
    Propfind,
    Put,
    Trace,
}

impl HttpRequestMethod {
    /// 所有可被解析的请求方法
    pub const ALL: [HttpRequestMethod; 10] = [
        HttpRequestMethod::Connect,
        HttpRequestMethod::Delete,
        HttpRequestMethod::Get,
        HttpRequestMethod::Head,
        HttpRequestMethod::Options,
        HttpRequestMethod::Patch,
        HttpRequestMethod::Post,
        HttpRequestMethod::Propfind,
        HttpRequestMethod::Put,
        HttpRequestMethod::Trace,
    ];

    /// 解析方法名，大小写不敏感。
    pub fn parse(method: &str) -> Option<Self> {
        let upper = method.to_ascii_uppercase();
        Self::ALL.iter().copied().find(|m| m.as_str() == upper)
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            HttpRequestMethod::Connect => "CONNECT",
            HttpRequestMethod::Delete => "DELETE",
            HttpRequestMethod::Get => "GET",
            HttpRequestMethod::Head => "HEAD",
            HttpRequestMethod::Options => "OPTIONS",
            HttpRequestMethod::Patch => "PATCH",
            HttpRequestMethod::Post => "POST",
            HttpRequestMethod::Propfind => "PROPFIND",
            HttpRequestMethod::Put => "PUT",
            HttpRequestMethod::Trace => "TRACE",
        }
    }
}

use std::fmt;

impl fmt::Display for HttpVersion {
    /// 将枚举格式化为 HTTP 报文中的版本字符串
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_0 => write!(f, "HTTP/1.0"),
            HttpVersion::V1_1 => write!(f, "HTTP/1.1"),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
