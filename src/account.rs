// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 示例控制器，注册后提供：
//!
//! - `POST /api/account/login`，请求体 `{"user": "...", "pass": "..."}`
//! - `GET  /api/account/logout`
//! - `GET  /api/account/profile?name=...`

use webrouter::{Actions, Controller, RequestContext};

use log::info;
use serde_derive::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Serialize)]
struct LoginResult {
    ok: bool,
    user: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct Profile {
    name: String,
    authorized: bool,
}

#[derive(Debug, Default)]
pub struct AccountController {
    token: Option<String>,
}

impl AccountController {
    fn login(&mut self, ctx: &mut RequestContext, input: LoginRequest) {
        let ok = !input.user.is_empty() && !input.pass.is_empty();
        let message = match ok {
            true => "登录成功",
            false => "用户名和密码不能为空",
        };
        info!("[ID{}]用户{}尝试登录：{}", ctx.id(), input.user, message);
        ctx.serve_json(&LoginResult {
            ok,
            user: input.user,
            message: message.to_string(),
        });
    }

    fn logout(&mut self, ctx: &mut RequestContext) {
        ctx.serve_json(&self.token.is_some());
    }

    fn profile(&mut self, ctx: &mut RequestContext) {
        let name = ctx.query("name");
        ctx.serve_json(&Profile {
            name,
            authorized: self.token.is_some(),
        });
    }
}

impl Controller for AccountController {
    fn actions(actions: &mut Actions<Self>) {
        actions
            .action_with("Login", AccountController::login)
            .action("Logout", AccountController::logout)
            .action("Profile", AccountController::profile);
    }

    fn init(&mut self, ctx: &RequestContext) {
        self.token = ctx.request().header("Token").map(str::to_string);
    }
}
