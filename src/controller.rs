// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 控制器约定
//!
//! 控制器是每个请求新建一次的短生命周期对象。控制器通过 [`Controller::actions`]
//! 显式列出对外暴露的方法，每个方法成为一条路由：
//!
//! ```ignore
//! impl Controller for AccountController {
//!     fn actions(actions: &mut Actions<Self>) {
//!         actions
//!             .action_with("Login", AccountController::login)
//!             .action("Logout", AccountController::logout);
//!     }
//! }
//! ```
//!
//! 带参数的方法在注册时记录参数类型（[`InputShape`]），请求到达时把请求体
//! 反序列化为该类型后再调用，调用时不再需要按名称查找方法。

use crate::{context::RequestContext, exception::Exception};

use serde::de::DeserializeOwned;
use std::sync::Arc;

/// 路由目标：新建控制器、绑定参数并调用方法。
pub type Invoker = dyn Fn(&mut RequestContext) -> Result<(), Exception> + Send + Sync;

pub trait Controller: Default + Send + 'static {
    /// 控制器的类型名，默认取类型路径的最后一段，例如 `AccountController`。
    fn name() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// 列出对外暴露的方法。
    fn actions(actions: &mut Actions<Self>);

    /// 方法调用前的初始化钩子。
    fn init(&mut self, _ctx: &RequestContext) {}
}

/// 方法参数的结构描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputShape {
    type_name: &'static str,
}

impl InputShape {
    pub fn of<T>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// 注册时收集到的单个方法
pub struct Action {
    pub(crate) name: &'static str,
    pub(crate) input: Option<InputShape>,
    pub(crate) invoker: Arc<Invoker>,
}

/// 控制器方法列表的构建器
pub struct Actions<C> {
    entries: Vec<Action>,
    _controller: std::marker::PhantomData<fn() -> C>,
}

impl<C: Controller> Actions<C> {
    pub(crate) fn collect() -> Vec<Action> {
        let mut actions = Self {
            entries: Vec::new(),
            _controller: std::marker::PhantomData,
        };
        C::actions(&mut actions);
        actions.entries
    }

    /// 注册一个不接收请求体参数的方法。
    pub fn action(
        &mut self,
        name: &'static str,
        method: fn(&mut C, &mut RequestContext),
    ) -> &mut Self {
        let invoker = move |ctx: &mut RequestContext| -> Result<(), Exception> {
            let mut controller = C::default();
            controller.init(ctx);
            method(&mut controller, ctx);
            Ok(())
        };
        self.entries.push(Action {
            name,
            input: None,
            invoker: Arc::new(invoker),
        });
        self
    }

    /// 注册一个以 JSON 请求体为参数的方法，参数类型 `I` 即该路由的输入结构。
    pub fn action_with<I>(
        &mut self,
        name: &'static str,
        method: fn(&mut C, &mut RequestContext, I),
    ) -> &mut Self
    where
        I: DeserializeOwned + 'static,
    {
        let invoker = move |ctx: &mut RequestContext| -> Result<(), Exception> {
            let mut controller = C::default();
            controller.init(ctx);
            let input = bind_input::<I>(ctx)?;
            method(&mut controller, ctx, input);
            Ok(())
        };
        self.entries.push(Action {
            name,
            input: Some(InputShape::of::<I>()),
            invoker: Arc::new(invoker),
        });
        self
    }
}

/// 把请求体反序列化为 `I`，失败时携带反序列化错误描述。
pub fn bind_input<I: DeserializeOwned>(ctx: &RequestContext) -> Result<I, Exception> {
    serde_json::from_slice(ctx.request().body()).map_err(|e| Exception::BadInput(e.to_string()))
}
