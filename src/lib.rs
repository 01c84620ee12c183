// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

pub mod config;
pub mod context;
pub mod controller;
pub mod cors;
pub mod dispatcher;
pub mod exception;
pub mod param;
pub mod request;
pub mod response;
pub mod route;
pub mod server;
pub mod upload;
pub mod util;

pub use config::{Config, CorsConfig};
pub use context::{ContextPool, PooledContext, RequestContext};
pub use controller::{Actions, Controller, InputShape};
pub use cors::{Cors, CorsNegotiator};
pub use dispatcher::Dispatcher;
pub use exception::Exception;
pub use param::{HttpRequestMethod, HttpVersion};
pub use request::Request;
pub use response::Response;
pub use route::{Route, RouteTable};
pub use server::ServerState;
pub use util::HtmlBuilder;
