// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 跨域访问（CORS）协商
//!
//! 分发器在写任何响应内容之前调用 [`CorsNegotiator::prepare_cors`]。
//! 对于预检请求（`OPTIONS` 且带有 `Access-Control-Request-Method` 或
//! `Access-Control-Request-Headers`），协商器完整接管响应，分发器随即结束处理。

use crate::{config::CorsConfig, param::HttpRequestMethod, request::Request, response::Response};

use log::debug;
use std::time::Duration;

pub const ACCESS_CONTROL_ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
pub const ACCESS_CONTROL_ALLOW_CREDENTIALS: &str = "Access-Control-Allow-Credentials";
pub const ACCESS_CONTROL_ALLOW_HEADERS: &str = "Access-Control-Allow-Headers";
pub const ACCESS_CONTROL_ALLOW_METHODS: &str = "Access-Control-Allow-Methods";
pub const ACCESS_CONTROL_EXPOSE_HEADERS: &str = "Access-Control-Expose-Headers";
pub const ACCESS_CONTROL_MAX_AGE: &str = "Access-Control-Max-Age";

pub const HEADER_ORIGIN: &str = "Origin";
pub const ACCESS_CONTROL_REQUEST_METHOD: &str = "Access-Control-Request-Method";
pub const ACCESS_CONTROL_REQUEST_HEADERS: &str = "Access-Control-Request-Headers";

/// 为响应附加跨域响应头的协作者。
#[cfg_attr(test, mockall::automock)]
pub trait CorsNegotiator: Send + Sync {
    /// 返回 `true` 表示这是一个预检请求，响应已经处理完毕。
    fn prepare_cors(&self, request: &Request, response: &mut Response) -> bool;
}

/// 是否为 CORS 预检请求
pub fn is_preflight(request: &Request) -> bool {
    request.method() == HttpRequestMethod::Options
        && (request.header(ACCESS_CONTROL_REQUEST_METHOD).is_some_and(|v| !v.is_empty())
            || request.header(ACCESS_CONTROL_REQUEST_HEADERS).is_some_and(|v| !v.is_empty()))
}

#[derive(Debug, Clone)]
pub struct Cors {
    allow_all_origins: bool,
    allow_origins: Vec<String>,
    allow_methods: Vec<String>,
    allow_headers: Vec<String>,
    expose_headers: Vec<String>,
    allow_credentials: bool,
    max_age: Duration,
}

impl Default for Cors {
    fn default() -> Self {
        Self::new(&CorsConfig::default())
    }
}

impl Cors {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            allow_all_origins: config.allow_all_origins,
            allow_origins: config.allow_origins.clone(),
            allow_methods: config.allow_methods.iter().map(|m| m.to_uppercase()).collect(),
            allow_headers: config.allow_headers.clone(),
            expose_headers: config.expose_headers.clone(),
            allow_credentials: config.allow_credentials,
            max_age: Duration::from_secs(config.max_age),
        }
    }

    /// 计算预检响应头。
    ///
    /// `Access-Control-Allow-Methods` 与 `Access-Control-Allow-Headers` 只包含
    /// 请求中声明且位于允许列表内的方法和请求头。
    fn preflight_headers(
        &self,
        origin: &str,
        request_method: &str,
        request_headers: &str,
    ) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();

        if !self.allow_all_origins && !self.is_origin_allowed(origin) {
            return headers;
        }
        headers.push((ACCESS_CONTROL_ALLOW_ORIGIN, self.origin_for(origin)));

        let request_method = request_method.trim().to_uppercase();
        if self.allow_methods.iter().any(|m| *m == request_method) {
            headers.push((ACCESS_CONTROL_ALLOW_METHODS, request_method));
        }

        let allowed_headers: Vec<&str> = request_headers
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .filter(|h| self.allow_headers.iter().any(|ah| ah.eq_ignore_ascii_case(h)))
            .collect();
        if !allowed_headers.is_empty() {
            headers.push((ACCESS_CONTROL_ALLOW_HEADERS, allowed_headers.join(",")));
        }

        self.push_common(&mut headers);
        headers
    }

    /// 计算普通请求的静态跨域响应头。
    fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();

        if self.allow_all_origins {
            headers.push((ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()));
        } else if !self.allow_origins.is_empty() {
            headers.push((ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origins.join(",")));
        }
        if !self.allow_methods.is_empty() {
            headers.push((ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.join(",")));
        }
        if !self.allow_headers.is_empty() {
            headers.push((ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.join(",")));
        }

        self.push_common(&mut headers);
        headers
    }

    fn push_common(&self, headers: &mut Vec<(&'static str, String)>) {
        if !self.expose_headers.is_empty() {
            headers.push((ACCESS_CONTROL_EXPOSE_HEADERS, self.expose_headers.join(",")));
        }
        headers.push((ACCESS_CONTROL_ALLOW_CREDENTIALS, self.allow_credentials.to_string()));
        if !self.max_age.is_zero() {
            headers.push((ACCESS_CONTROL_MAX_AGE, self.max_age.as_secs().to_string()));
        }
    }

    fn origin_for(&self, origin: &str) -> String {
        match self.allow_all_origins {
            true => "*".to_string(),
            false => origin.to_string(),
        }
    }

    fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allow_origins.iter().any(|o| o == origin)
    }
}

impl CorsNegotiator for Cors {
    fn prepare_cors(&self, request: &Request, response: &mut Response) -> bool {
        if is_preflight(request) {
            let origin = request.header(HEADER_ORIGIN).unwrap_or_default();
            let method = request.header(ACCESS_CONTROL_REQUEST_METHOD).unwrap_or_default();
            let headers = request.header(ACCESS_CONTROL_REQUEST_HEADERS).unwrap_or_default();
            debug!(
                "[ID{}]CORS预检：origin={}, method={}, headers={}",
                request.id(),
                origin,
                method,
                headers
            );
            for (name, value) in self.preflight_headers(origin, method, headers) {
                response.set_header(name, &value);
            }
            response.set_code(200);
            return true;
        }
        for (name, value) in self.headers() {
            response.set_header(name, &value);
        }
        false
    }
}
