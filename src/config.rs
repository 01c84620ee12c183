// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;

use crate::exception::Exception;
use crate::param::{HOMEPAGE, MAX_MEMORY, PROJECT_NAME, STATIC_FOLDER};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_www_root")]
    www_root: String,
    #[serde(default = "default_project")]
    project: String,
    #[serde(default = "default_homepage")]
    homepage: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_local")]
    local: bool,
    #[serde(default = "default_max_body_size")]
    max_body_size: usize,
    #[serde(default = "default_context_pool_size")]
    context_pool_size: usize,
    /// 请求体无法绑定时是否沿用 200 状态码（兼容旧客户端）
    #[serde(default = "default_legacy_bad_input")]
    legacy_bad_input: bool,
    #[serde(default)]
    cors: CorsConfig,
    /// 业务自定义配置，通过 `get`/`int`/`bool` 等方法读取
    #[serde(default)]
    settings: toml::Table,
}

/// 跨域访问策略
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_all_origins: bool,
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
    /// 预检结果的缓存时间，单位秒，0 表示不发送 `Access-Control-Max-Age`
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            allow_all_origins: true,
            allow_origins: strings(&["http://localhost:4200"]),
            allow_methods: strings(&[
                "GET", "POST", "PUT", "DELETE", "OPTIONS", "HEAD", "CONNECT", "TRACE", "PATCH",
            ]),
            allow_headers: strings(&[
                "Origin",
                "Authorization",
                "Access-Control-Allow-Origin",
                "Access-Control-Allow-Headers",
                "Content-Type",
                "x-requested-with",
                "Token",
            ]),
            expose_headers: strings(&[
                "Content-Length",
                "Access-Control-Allow-Origin",
                "Access-Control-Allow-Headers",
                "Content-Type",
            ]),
            allow_credentials: true,
            max_age: 3600,
        }
    }
}

fn default_www_root() -> String {
    STATIC_FOLDER.to_string()
}

fn default_project() -> String {
    PROJECT_NAME.to_string()
}

fn default_homepage() -> String {
    HOMEPAGE.to_string()
}

fn default_port() -> u16 {
    7878
}

fn default_local() -> bool {
    true
}

fn default_max_body_size() -> usize {
    MAX_MEMORY
}

fn default_context_pool_size() -> usize {
    256
}

fn default_legacy_bad_input() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            www_root: default_www_root(),
            project: default_project(),
            homepage: default_homepage(),
            port: default_port(),
            worker_threads: num_cpus::get(),
            local: default_local(),
            max_body_size: default_max_body_size(),
            context_pool_size: default_context_pool_size(),
            legacy_bad_input: default_legacy_bad_input(),
            cors: CorsConfig::default(),
            settings: toml::Table::new(),
        }
    }

    /// 从 TOML 文件读取配置。
    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let mut file = File::open(filename).map_err(|e| {
            error!("无法打开配置文件{}：{}", filename, e);
            Exception::ConfigFile(format!("no such file {}: {}", filename, e))
        })?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val)
            .map_err(|e| Exception::ConfigFile(format!("error reading {}: {}", filename, e)))?;
        Self::parse(&str_val)
    }

    /// 从 TOML 文本构建配置，并修正不合理的取值。
    pub fn parse(text: &str) -> Result<Self, Exception> {
        let mut raw_config: Config =
            toml::from_str(text).map_err(|e| Exception::ConfigFile(e.to_string()))?;
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.context_pool_size == 0 {
            warn!("context_pool_size被设置为0，上下文将无法复用，该值将被改为1。");
            raw_config.context_pool_size = 1;
        }
        raw_config.settings = lowercase_keys(raw_config.settings);
        Ok(raw_config)
    }
}

impl Config {
    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn homepage(&self) -> &str {
        &self.homepage
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    pub fn context_pool_size(&self) -> usize {
        self.context_pool_size
    }

    pub fn legacy_bad_input(&self) -> bool {
        self.legacy_bad_input
    }

    pub fn cors(&self) -> &CorsConfig {
        &self.cors
    }
}

// --- 键值查询接口 ---
//
// 键名大小写不敏感，`section.key` 形式可访问 `[settings.section]` 子表。

impl Config {
    /// 读取字符串值，键不存在时返回空字符串。
    pub fn get(&self, key: &str) -> String {
        if key.is_empty() {
            return String::new();
        }
        let key = key.to_lowercase();
        let mut table = &self.settings;
        let mut segments = key.split('.').peekable();
        while let Some(segment) = segments.next() {
            let value = match table.get(segment) {
                Some(v) => v,
                None => return String::new(),
            };
            if segments.peek().is_none() {
                return match value {
                    toml::Value::String(s) => s.clone(),
                    toml::Value::Table(_) => String::new(),
                    other => other.to_string(),
                };
            }
            table = match value.as_table() {
                Some(t) => t,
                None => return String::new(),
            };
        }
        String::new()
    }

    pub fn int(&self, key: &str) -> Result<i32, Exception> {
        self.get(key)
            .parse()
            .map_err(|_| Exception::ConfigValue(key.to_string()))
    }

    pub fn int64(&self, key: &str) -> Result<i64, Exception> {
        self.get(key)
            .parse()
            .map_err(|_| Exception::ConfigValue(key.to_string()))
    }

    pub fn bool(&self, key: &str) -> Result<bool, Exception> {
        match self.get(key).to_lowercase().as_str() {
            "1" | "t" | "true" => Ok(true),
            "0" | "f" | "false" => Ok(false),
            _ => Err(Exception::ConfigValue(key.to_string())),
        }
    }

    pub fn float64(&self, key: &str) -> Result<f64, Exception> {
        self.get(key)
            .parse()
            .map_err(|_| Exception::ConfigValue(key.to_string()))
    }

    /// 写入一个顶层字符串配置项，只应在开始服务之前调用。
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), Exception> {
        if key.is_empty() {
            return Err(Exception::ConfigValue("can not set empty key".to_string()));
        }
        self.settings
            .insert(key.to_lowercase(), toml::Value::String(value.to_string()));
        Ok(())
    }
}

fn lowercase_keys(table: toml::Table) -> toml::Table {
    table
        .into_iter()
        .map(|(k, v)| {
            let v = match v {
                toml::Value::Table(t) => toml::Value::Table(lowercase_keys(t)),
                other => other,
            };
            (k.to_lowercase(), v)
        })
        .collect()
}
