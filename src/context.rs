// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求上下文与上下文池
//!
//! 每个在途请求独占一个 [`RequestContext`]，其中保存请求与正在构建的响应。
//! 上下文从 [`ContextPool`] 借出，借出凭证 [`PooledContext`] 在离开作用域时
//! （包括提前返回与 panic 展开）把上下文清空后归还，复用响应缓冲区的容量。

use crate::{request::Request, response::Response};

use log::{debug, error, warn};
use serde::Serialize;

use std::{
    ops::{Deref, DerefMut},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

/// 单个请求的上下文。
#[derive(Debug, Default)]
pub struct RequestContext {
    request: Request,
    response: Response,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定新的请求并清空上一次使用留下的响应。
    pub fn reset(&mut self, request: Request) {
        self.request = request;
        self.response.reset();
        self.response.set_version(*self.request.version());
    }

    fn clear(&mut self) {
        self.request = Request::default();
        self.response.reset();
    }

    pub fn id(&self) -> u128 {
        self.request.id()
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// 同时借出请求（只读）与响应（可写）。
    pub fn split_mut(&mut self) -> (&Request, &mut Response) {
        (&self.request, &mut self.response)
    }

    /// 以 JSON 形式输出数据，序列化失败时返回 500。
    pub fn serve_json<T: Serialize + ?Sized>(&mut self, data: &T) {
        if let Err(e) = self.response.write_json(data) {
            error!("[ID{}]序列化响应数据失败：{}", self.id(), e);
            self.response.error_page(500, None);
        }
    }

    /// 读取查询串中的表单值，不存在时返回空字符串。
    pub fn query(&self, key: &str) -> String {
        self.request.query(key).unwrap_or_default()
    }
}

/// 线程安全的上下文池。
#[derive(Debug)]
pub struct ContextPool {
    idle: Mutex<Vec<RequestContext>>,
    max_idle: usize,
    created: AtomicUsize,
}

impl ContextPool {
    /// `max_idle` 为池中最多保留的空闲上下文数量。
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            created: AtomicUsize::new(0),
        }
    }

    /// 借出一个上下文：优先复用空闲上下文，否则新建。
    pub fn acquire(self: &Arc<Self>) -> PooledContext {
        let recycled = self.lock_idle().pop();
        let ctx = match recycled {
            Some(ctx) => ctx,
            None => {
                let total = self.created.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("上下文池为空，新建上下文，累计创建{}个", total);
                RequestContext::new()
            }
        };
        PooledContext {
            ctx,
            pool: Arc::clone(self),
        }
    }

    /// 归还上下文。归还前会清空请求与响应，池满时直接丢弃。
    pub fn release(&self, mut ctx: RequestContext) {
        ctx.clear();
        let mut idle = self.lock_idle();
        if idle.len() < self.max_idle {
            idle.push(ctx);
        }
    }

    /// 当前空闲的上下文数量
    pub fn idle(&self) -> usize {
        self.lock_idle().len()
    }

    /// 自启动以来新建的上下文数量
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    fn lock_idle(&self) -> std::sync::MutexGuard<'_, Vec<RequestContext>> {
        match self.idle.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("上下文池锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }
}

/// 借出的上下文，Drop 时自动归还到池中。
#[derive(Debug)]
pub struct PooledContext {
    ctx: RequestContext,
    pool: Arc<ContextPool>,
}

impl Deref for PooledContext {
    type Target = RequestContext;

    fn deref(&self) -> &RequestContext {
        &self.ctx
    }
}

impl DerefMut for PooledContext {
    fn deref_mut(&mut self) -> &mut RequestContext {
        &mut self.ctx
    }
}

impl Drop for PooledContext {
    fn drop(&mut self) {
        let ctx = std::mem::take(&mut self.ctx);
        self.pool.release(ctx);
    }
}
