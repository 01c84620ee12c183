// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::{param::*, util::HtmlBuilder};

use bytes::{BufMut, BytesMut};
use chrono::prelude::*;
use log::error;
use serde::Serialize;

/// 正在构建的 HTTP 响应。
///
/// 控制器通过 [`Response::write`] / [`Response::write_json`] 追加响应体，
/// 分发结束后由连接层调用 [`Response::as_bytes`] 一次性写出。
/// 响应对象随上下文一起被池化复用，`reset` 会保留缓冲区容量。
#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    headers: Vec<(String, String)>,
    content: BytesMut,
    date: DateTime<Utc>,
    server_name: String,
    /// HEAD 请求只发送响应头
    head_only: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            headers: Vec::new(),
            content: BytesMut::new(),
            date: Utc::now(),
            server_name: SERVER_NAME.to_string(),
            head_only: false,
        }
    }

    /// 清空状态与内容，供下一个请求复用。
    pub fn reset(&mut self) {
        self.version = HttpVersion::V1_1;
        self.status_code = 200;
        self.information.clear();
        self.information.push_str("OK");
        self.content_type = None;
        self.headers.clear();
        self.content.clear();
        self.date = Utc::now();
        self.head_only = false;
    }

    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&info) => info.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                String::new()
            }
        };
        self
    }

    pub fn set_version(&mut self, version: HttpVersion) -> &mut Self {
        self.version = version;
        self
    }

    pub fn set_content_type(&mut self, content_type: &str) -> &mut Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    pub fn set_head_only(&mut self, head_only: bool) -> &mut Self {
        self.head_only = head_only;
        self
    }

    /// 设置响应头，已存在的同名响应头（大小写不敏感）会被替换。
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
        self
    }

    /// 追加原始字节到响应体。
    pub fn write(&mut self, data: &[u8]) -> &mut Self {
        self.content.extend_from_slice(data);
        self
    }

    /// 将数据序列化为一行 JSON 追加到响应体，并设置 `Content-Type`。
    pub fn write_json<T: Serialize + ?Sized>(&mut self, data: &T) -> Result<(), serde_json::Error> {
        let encoded = serde_json::to_vec(data)?;
        if self.content_type.is_none() {
            self.content_type = Some("application/json".to_string());
        }
        self.content.extend_from_slice(&encoded);
        self.content.put_u8(b'\n');
        Ok(())
    }

    /// 用状态码对应的 HTML 错误页替换当前内容。
    pub fn error_page(&mut self, code: u16, note: Option<&str>) -> &mut Self {
        let html = HtmlBuilder::from_status_code(code, note).build();
        self.content.clear();
        self.content.extend_from_slice(html.as_bytes());
        self.content_type = Some("text/html;charset=utf-8".to_string());
        self.set_code(code)
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let content_length = self.content.len().to_string();
        let date = format_date(&self.date);

        let mut header = format!(
            "{} {} {}{}",
            self.version, self.status_code, self.information, CRLF
        );
        if let Some(t) = &self.content_type {
            header.push_str(&["Content-Type: ", t, CRLF].concat());
        }
        header.push_str(&["Content-Length: ", &content_length, CRLF].concat());
        header.push_str(&["Date: ", &date, CRLF].concat());
        header.push_str(&["Server: ", &self.server_name, CRLF].concat());
        header.push_str(&["Connection: close", CRLF].concat());
        for (name, value) in &self.headers {
            header.push_str(&[name.as_str(), ": ", value, CRLF].concat());
        }
        header.push_str(CRLF);

        let body: &[u8] = match self.head_only {
            true => b"",
            false => &self.content,
        };
        [header.as_bytes(), body].concat()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn content_length(&self) -> usize {
        self.content.len()
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
