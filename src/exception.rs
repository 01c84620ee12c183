// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了路由器在请求处理生命周期中可能抛出的各类异常情况。
//!
//! - **错误分类**：协议解析错误、路由错误、参数绑定错误、上传错误以及配置错误。
//! - **语义映射**：每个变体通过 [`Exception::status_code`] 对应一个 HTTP 状态码，
//!   由分发器或连接层在边界处转化为响应，服务过程中不会向上冒泡成进程级错误。

use std::fmt;

/// 服务器处理请求过程中发生的异常类型。
#[derive(Debug, Clone, PartialEq)]
pub enum Exception {
    /// 请求头无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 客户端使用了无法识别的 HTTP 方法。
    UnSupportedRequestMethod,
    /// 客户端使用了服务器不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 请求行或请求头格式错误，或者连接在请求体读完之前关闭。
    MalformedRequest,
    /// 请求体超过配置的上限。对应 `413 Content Too Large`。
    PayloadTooLarge,
    /// 静态资源或首页文件不存在。对应 `404 Not Found`。
    FileNotFound,
    /// 请求的路径包含越权片段（如 `..`）。对应 `400 Bad Request`。
    InvalidPath,
    /// 未注册的 API 路由。对应 `404 Not Found`。
    RouteNotFound,
    /// 请求体无法反序列化为控制器方法声明的参数类型，携带反序列化错误描述。
    BadInput(String),
    /// multipart 表单中没有 `uploadfile` 字段。
    MissingUploadFile,
    /// 上传文件的文件名为空。
    EmptyFileName,
    /// 上传文件没有扩展名，无法确定格式。
    UnsupportedFileFormat,
    /// multipart 报文格式错误（缺少 boundary 或分段不完整）。
    MalformedMultipart,
    /// 文件系统读写失败，携带底层错误描述。
    Io(String),
    /// 配置文件无法读取或解析。
    ConfigFile(String),
    /// 配置项不存在或无法转换为请求的类型，携带键名。
    ConfigValue(String),
}

use Exception::*;

impl Exception {
    /// 该异常对应的 HTTP 状态码。
    ///
    /// `BadInput` 返回 400，兼容模式下分发器会忽略该值并以 200 响应。
    pub fn status_code(&self) -> u16 {
        match self {
            RequestIsNotUtf8 | UnSupportedRequestMethod | MalformedRequest | InvalidPath => 400,
            UnsupportedHttpVersion => 505,
            PayloadTooLarge => 413,
            FileNotFound | RouteNotFound => 404,
            BadInput(_) => 400,
            MissingUploadFile | EmptyFileName | UnsupportedFileFormat | MalformedMultipart => 400,
            Io(_) | ConfigFile(_) | ConfigValue(_) => 500,
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            MalformedRequest => write!(f, "Malformed HTTP request"),
            PayloadTooLarge => write!(f, "Request body too large (413)"),
            FileNotFound => write!(f, "File not found (404)"),
            InvalidPath => write!(f, "Invalid path (400)"),
            RouteNotFound => write!(f, "Route not found"),
            BadInput(msg) => write!(f, "{}", msg),
            MissingUploadFile => write!(f, "No uploadfile field in form"),
            EmptyFileName => write!(f, "File name can't be empty"),
            UnsupportedFileFormat => write!(f, "Unsupported file format"),
            MalformedMultipart => write!(f, "Malformed multipart body"),
            Io(msg) => write!(f, "I/O error: {}", msg),
            ConfigFile(msg) => write!(f, "config error: {}", msg),
            ConfigValue(key) => write!(f, "config error: invalid value for key {}", key),
        }
    }
}

impl From<std::io::Error> for Exception {
    fn from(e: std::io::Error) -> Self {
        Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_input_displays_raw_message() {
        let e = BadInput("expected ident at line 1 column 2".to_string());
        assert_eq!(e.to_string(), "expected ident at line 1 column 2");
        assert_eq!(e.status_code(), 400);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(RouteNotFound.status_code(), 404);
        assert_eq!(PayloadTooLarge.status_code(), 413);
        assert_eq!(Io("disk full".into()).status_code(), 500);
        assert_eq!(UnsupportedFileFormat.status_code(), 400);
    }
}
