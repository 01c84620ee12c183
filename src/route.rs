// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由表
//!
//! 注册控制器时为每个方法生成一条 [`Route`]，路由格式为
//! `/api/<去掉 Controller 后缀并小写的控制器名>/<小写的方法名>`。
//! 同名路由后注册者覆盖先注册者。路由表只在开始服务之前修改，
//! 之后被所有连接并发只读访问。

use crate::{
    context::RequestContext,
    controller::{Actions, Controller, InputShape, Invoker},
    exception::Exception,
    param::{PREFIX_API, SUFFIX_CONTROLLER},
};

use log::{debug, warn};
use std::{collections::HashMap, fmt, sync::Arc};

/// 一条已注册的 API 路由
#[derive(Clone)]
pub struct Route {
    pattern: String,
    handler_type: &'static str,
    method_name: &'static str,
    input_shape: Option<InputShape>,
    target: Arc<Invoker>,
}

impl Route {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn handler_type(&self) -> &'static str {
        self.handler_type
    }

    pub fn method_name(&self) -> &'static str {
        self.method_name
    }

    pub fn input_shape(&self) -> Option<InputShape> {
        self.input_shape
    }

    /// 新建控制器并调用方法。
    pub fn invoke(&self, ctx: &mut RequestContext) -> Result<(), Exception> {
        (self.target)(ctx)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("handler_type", &self.handler_type)
            .field("method_name", &self.method_name)
            .field("input_shape", &self.input_shape)
            .finish()
    }
}

/// 去掉控制器类型名的 `Controller` 后缀。
pub fn controller_name(type_name: &str) -> &str {
    type_name.strip_suffix(SUFFIX_CONTROLLER).unwrap_or(type_name)
}

/// 生成路由格式：/api/account/login
pub fn route_pattern(controller: &str, method: &str) -> String {
    format!(
        "{}/{}/{}",
        PREFIX_API,
        controller.to_lowercase(),
        method.to_lowercase()
    )
}

#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<String, Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册控制器的全部方法，返回生成的路由数量。
    pub fn register<C: Controller>(&mut self) -> usize {
        let handler_type = C::name();
        let name = controller_name(handler_type);
        let actions = Actions::<C>::collect();
        let count = actions.len();

        for action in actions {
            let pattern = route_pattern(name, action.name);
            let route = Route {
                pattern: pattern.clone(),
                handler_type,
                method_name: action.name,
                input_shape: action.input,
                target: action.invoker,
            };
            debug!("注册路由 {} -> {}::{}", pattern, handler_type, action.name);
            if let Some(old) = self.routes.insert(pattern, route) {
                warn!(
                    "路由 {} 已由 {}::{} 注册，被 {}::{} 覆盖",
                    old.pattern, old.handler_type, old.method_name, handler_type, action.name
                );
            }
        }
        count
    }

    /// 按请求路径查找路由，大小写不敏感。
    pub fn find(&self, path: &str) -> Result<&Route, Exception> {
        let pattern = path.to_lowercase();
        self.routes.get(&pattern).ok_or(Exception::RouteNotFound)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// 已注册的路由格式，按字典序排列
    pub fn patterns(&self) -> Vec<&str> {
        let mut patterns: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        patterns.sort_unstable();
        patterns
    }
}
