// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求分发器
//!
//! 分发器持有路由表、上下文池与 CORS 协商器。每个请求的处理流程为：
//!
//! 1. 从池中借出上下文并绑定请求；
//! 2. 调用 CORS 协商器，预检请求到此结束；
//! 3. 按路径前缀分类：`/` 首页、`/api` 控制器方法、`/www` 静态资源、`/upload` 文件上传；
//! 4. 把处理过程中的异常转换为对应的响应；
//! 5. 写出响应，上下文随借出凭证一起归还。

use crate::{
    config::Config,
    context::{ContextPool, RequestContext},
    controller::Controller,
    cors::{Cors, CorsNegotiator},
    exception::Exception,
    param::{
        mime_for, HttpRequestMethod, DEFAULT_MIME, HOMEPAGE, PREFIX_API, PREFIX_STATIC,
        PREFIX_UPLOAD,
    },
    request::Request,
    route::RouteTable,
    upload,
};

use log::{debug, error, info, warn};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

/// 请求路径的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Root,
    Api,
    Static,
    Upload,
    Unmatched,
}

/// 前缀必须在路径段边界上匹配，`/apix` 不属于 `/api`。
fn has_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// 与 `has_prefix` 相同，但前缀部分不区分大小写。
fn has_prefix_ignore_case(path: &str, prefix: &str) -> bool {
    match (path.get(..prefix.len()), path.get(prefix.len()..)) {
        (Some(head), Some(rest)) => {
            head.eq_ignore_ascii_case(prefix) && (rest.is_empty() || rest.starts_with('/'))
        }
        _ => false,
    }
}

pub fn classify(path: &str) -> PathKind {
    if path == "/" {
        PathKind::Root
    } else if has_prefix_ignore_case(path, PREFIX_API) {
        PathKind::Api
    } else if has_prefix(path, PREFIX_STATIC) {
        PathKind::Static
    } else if has_prefix(path, PREFIX_UPLOAD) {
        PathKind::Upload
    } else {
        PathKind::Unmatched
    }
}

pub struct Dispatcher {
    routes: RouteTable,
    pool: Arc<ContextPool>,
    cors: Box<dyn CorsNegotiator>,
    config: Arc<Config>,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            routes: RouteTable::new(),
            pool: Arc::new(ContextPool::new(config.context_pool_size())),
            cors: Box::new(Cors::new(config.cors())),
            config,
        }
    }

    /// 替换默认的 CORS 协商器。
    pub fn with_cors<N: CorsNegotiator + 'static>(mut self, cors: N) -> Self {
        self.cors = Box::new(cors);
        self
    }

    /// 注册控制器，只应在开始服务之前调用。
    pub fn register<C: Controller>(&mut self) -> &mut Self {
        let count = self.routes.register::<C>();
        info!("控制器{}注册完成，共{}条路由", C::name(), count);
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn pool(&self) -> &Arc<ContextPool> {
        &self.pool
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 处理一个完整的请求并把响应写入 `writer`，返回响应状态码。
    pub async fn handle<W: AsyncWrite + Unpin>(
        &self,
        request: Request,
        writer: &mut W,
    ) -> io::Result<u16> {
        let start_time = Instant::now();
        let id = request.id();

        let mut ctx = self.pool.acquire();
        ctx.reset(request);
        self.dispatch(&mut ctx).await;

        let request = ctx.request();
        let response = ctx.response();
        debug!(
            "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
            id,
            start_time.elapsed().as_millis()
        );
        info!(
            "[ID{}] {}, {}, {}, {}, {}, {}, ",
            id,
            request.version(),
            request.path(),
            request.method(),
            response.status_code(),
            response.information(),
            request.user_agent(),
        );

        writer.write_all(&response.as_bytes()).await?;
        writer.flush().await?;
        Ok(response.status_code())
    }

    /// 根据请求路径填充上下文中的响应。
    pub async fn dispatch(&self, ctx: &mut RequestContext) {
        let id = ctx.id();
        let head_only = ctx.request().method() == HttpRequestMethod::Head;

        let (request, response) = ctx.split_mut();
        if self.cors.prepare_cors(request, response) {
            debug!("[ID{}]CORS预检请求处理完毕", id);
            ctx.response_mut().set_code(200);
            return;
        }

        let path = ctx.request().path().to_string();
        let result = match classify(&path) {
            PathKind::Root => self.serve_root(ctx).await,
            PathKind::Api => self.serve_api(ctx),
            PathKind::Static => self.serve_static(ctx, &path).await,
            PathKind::Upload => self.serve_upload(ctx).await,
            PathKind::Unmatched => Err(Exception::RouteNotFound),
        };
        if let Err(e) = result {
            self.respond_error(ctx, e);
        }
        ctx.response_mut().set_head_only(head_only);
    }

    async fn serve_root(&self, ctx: &mut RequestContext) -> Result<(), Exception> {
        let path = Path::new(self.config.www_root())
            .join(self.config.project())
            .join(self.config.homepage());
        let page = tokio::fs::read(&path).await.map_err(|e| {
            warn!("[ID{}]无法读取首页{}：{}", ctx.id(), path.display(), e);
            Exception::FileNotFound
        })?;
        ctx.response_mut()
            .set_content_type("text/html;charset=utf-8")
            .write(&page);
        Ok(())
    }

    fn serve_api(&self, ctx: &mut RequestContext) -> Result<(), Exception> {
        let route = self.routes.find(ctx.request().path())?;
        debug!(
            "[ID{}]路由 {} -> {}::{}",
            ctx.id(),
            route.pattern(),
            route.handler_type(),
            route.method_name()
        );
        route.invoke(ctx)
    }

    async fn serve_static(&self, ctx: &mut RequestContext, path: &str) -> Result<(), Exception> {
        let file_path = static_file_path(Path::new(self.config.www_root()), path)?;
        let metadata = tokio::fs::metadata(&file_path)
            .await
            .map_err(|_| Exception::FileNotFound)?;
        let file_path = match metadata.is_dir() {
            true => file_path.join(HOMEPAGE),
            false => file_path,
        };
        let data = tokio::fs::read(&file_path)
            .await
            .map_err(|_| Exception::FileNotFound)?;
        let mime = file_path
            .extension()
            .and_then(|e| e.to_str())
            .map(mime_for)
            .unwrap_or(DEFAULT_MIME);
        debug!("[ID{}]静态资源：{}，类型：{}", ctx.id(), file_path.display(), mime);
        ctx.response_mut().set_content_type(mime).write(&data);
        Ok(())
    }

    async fn serve_upload(&self, ctx: &mut RequestContext) -> Result<(), Exception> {
        let saved = upload::save_upload(ctx, Path::new(self.config.www_root())).await?;
        info!("[ID{}]文件上传完成：{}", ctx.id(), saved);
        ctx.serve_json(&saved);
        Ok(())
    }

    fn respond_error(&self, ctx: &mut RequestContext, e: Exception) {
        let id = ctx.id();
        let path = ctx.request().path().to_string();
        match e {
            Exception::BadInput(ref message) => {
                let code = match self.config.legacy_bad_input() {
                    true => 200,
                    false => 400,
                };
                warn!(
                    "[ID{}]请求体无法绑定到{}的参数：{}，返回{}",
                    id, path, message, code
                );
                ctx.response_mut().set_code(code);
                ctx.serve_json(message);
            }
            Exception::MissingUploadFile
            | Exception::EmptyFileName
            | Exception::UnsupportedFileFormat
            | Exception::MalformedMultipart => {
                warn!("[ID{}]上传请求{}被拒绝：{}", id, path, e);
                ctx.response_mut().set_code(e.status_code());
                ctx.serve_json(&e.to_string());
            }
            Exception::RouteNotFound | Exception::FileNotFound => {
                warn!("[ID{}]请求的路径：{} 不存在，返回404", id, path);
                ctx.response_mut().error_page(404, None);
            }
            Exception::InvalidPath => {
                warn!("[ID{}]请求的路径：{} 包含非法字符，返回400", id, path);
                ctx.response_mut().error_page(400, None);
            }
            other => {
                error!("[ID{}]处理请求时发生异常：{}", id, other);
                ctx.response_mut().error_page(other.status_code(), None);
            }
        }
    }
}

/// 把 `/www/...` 映射为 `root` 下的文件路径，拒绝 `..` 片段。
pub fn static_file_path(root: &Path, path: &str) -> Result<PathBuf, Exception> {
    let relative = path.strip_prefix(PREFIX_STATIC).unwrap_or(path);
    let mut file_path = root.to_path_buf();
    for segment in relative.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(Exception::InvalidPath),
            s if s.contains('\\') => return Err(Exception::InvalidPath),
            s => file_path.push(s),
        }
    }
    Ok(file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{controller::Actions, cors::MockCorsNegotiator};
    use serde_derive::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static INVOCATIONS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Deserialize)]
    struct LoginRequest {
        user: String,
        pass: String,
    }

    #[derive(Default)]
    struct AccountController;

    impl AccountController {
        fn login(&mut self, ctx: &mut RequestContext, input: LoginRequest) {
            INVOCATIONS.fetch_add(1, Ordering::SeqCst);
            ctx.serve_json(&format!("{}:{}", input.user, input.pass.len()));
        }

        fn counter(&mut self, ctx: &mut RequestContext) {
            INVOCATIONS.fetch_add(1, Ordering::SeqCst);
            ctx.serve_json(&INVOCATIONS.load(Ordering::SeqCst));
        }
    }

    impl Controller for AccountController {
        fn actions(actions: &mut Actions<Self>) {
            actions
                .action_with("Login", AccountController::login)
                .action("Counter", AccountController::counter);
        }
    }

    fn dispatcher(config: Config) -> Dispatcher {
        let mut dispatcher = Dispatcher::new(Arc::new(config));
        dispatcher.register::<AccountController>();
        dispatcher
    }

    async fn run(dispatcher: &Dispatcher, request: Request) -> RequestContext {
        let mut ctx = RequestContext::new();
        ctx.reset(request);
        dispatcher.dispatch(&mut ctx).await;
        ctx
    }

    fn www_config(root: &Path) -> Config {
        Config::parse(&format!("www_root = {:?}", root.to_string_lossy())).unwrap()
    }

    fn get(path: &str, id: u128) -> Request {
        Request::new(HttpRequestMethod::Get, path, id)
    }

    fn post(path: &str, body: &'static str) -> Request {
        Request::new(HttpRequestMethod::Post, path, 1).with_body(body)
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("/"), PathKind::Root);
        assert_eq!(classify("/api/account/login"), PathKind::Api);
        assert_eq!(classify("/api"), PathKind::Api);
        assert_eq!(classify("/API/Account/Login"), PathKind::Api);
        assert_eq!(classify("/Api"), PathKind::Api);
        assert_eq!(classify("/APIX/a"), PathKind::Unmatched);
        assert_eq!(classify("/WWW/site.css"), PathKind::Unmatched);
        assert_eq!(classify("/www/css/site.css"), PathKind::Static);
        assert_eq!(classify("/upload/gallery"), PathKind::Upload);
        assert_eq!(classify("/apix/a"), PathKind::Unmatched);
        assert_eq!(classify("/favicon.ico"), PathKind::Unmatched);
        assert_eq!(classify(""), PathKind::Unmatched);
    }

    #[test]
    fn test_static_file_path() {
        let root = Path::new("www");
        assert_eq!(
            static_file_path(root, "/www/css/site.css").unwrap(),
            Path::new("www/css/site.css")
        );
        assert_eq!(static_file_path(root, "/www").unwrap(), Path::new("www"));
        assert_eq!(
            static_file_path(root, "/www/../Cargo.toml").unwrap_err(),
            Exception::InvalidPath
        );
        assert_eq!(
            static_file_path(root, "/www/a/..\\..\\b").unwrap_err(),
            Exception::InvalidPath
        );
    }

    #[tokio::test]
    async fn test_api_binds_json_body() {
        let dispatcher = dispatcher(Config::new());
        let body = r#"{"user":"alice","pass":"secret"}"#;
        let ctx = run(&dispatcher, post("/api/account/login", body)).await;

        assert_eq!(ctx.response().status_code(), 200);
        assert_eq!(ctx.response().content(), b"\"alice:6\"\n");
        assert_eq!(ctx.response().content_type(), Some("application/json"));
    }

    #[tokio::test]
    async fn test_api_route_lookup_ignores_case() {
        let dispatcher = dispatcher(Config::new());
        let ctx = run(&dispatcher, post("/API/Account/Login", r#"{"user":"a","pass":""}"#)).await;
        assert_eq!(ctx.response().status_code(), 200);
        assert_eq!(ctx.response().content(), b"\"a:0\"\n");
    }

    #[tokio::test]
    async fn test_api_route_lookup_after_percent_decoding() {
        let dispatcher = dispatcher(Config::new());
        let request = Request::new(HttpRequestMethod::Post, "/api/account/log%69n", 1)
            .with_body(r#"{"user":"a","pass":"xy"}"#);
        let ctx = run(&dispatcher, request).await;
        assert_eq!(ctx.response().content(), b"\"a:2\"\n");
    }

    #[tokio::test]
    async fn test_bad_input_legacy_mode_answers_200() {
        let dispatcher = dispatcher(Config::new());
        let ctx = run(&dispatcher, post("/api/account/login", "not-json")).await;

        assert_eq!(ctx.response().status_code(), 200);
        let body: String = serde_json::from_slice(ctx.response().content()).unwrap();
        assert!(!body.is_empty());
    }

    #[tokio::test]
    async fn test_bad_input_corrected_mode_answers_400() {
        let dispatcher = dispatcher(Config::parse("legacy_bad_input = false").unwrap());
        let ctx = run(&dispatcher, post("/api/account/login", "{}")).await;

        assert_eq!(ctx.response().status_code(), 400);
        let body: String = serde_json::from_slice(ctx.response().content()).unwrap();
        assert!(body.contains("user"));
    }

    #[tokio::test]
    async fn test_unknown_api_and_unmatched_paths_are_404() {
        let dispatcher = dispatcher(Config::new());

        let ctx = run(&dispatcher, post("/api/account/missing", "")).await;
        assert_eq!(ctx.response().status_code(), 404);

        let ctx = run(&dispatcher, get("/favicon.ico", 2)).await;
        assert_eq!(ctx.response().status_code(), 404);
    }

    #[tokio::test]
    async fn test_preflight_is_terminal() {
        let mut cors = MockCorsNegotiator::new();
        cors.expect_prepare_cors().times(1).returning(|_, response| {
            response.set_code(200).set_header("Access-Control-Allow-Origin", "*");
            true
        });
        let dispatcher = dispatcher(Config::new()).with_cors(cors);

        let request = Request::new(HttpRequestMethod::Options, "/api/account/counter", 1)
            .with_header("Access-Control-Request-Method", "GET");
        let ctx = run(&dispatcher, request).await;

        assert_eq!(ctx.response().status_code(), 200);
        assert!(ctx.response().content().is_empty());
        assert_eq!(ctx.response().header("Access-Control-Allow-Origin"), Some("*"));
    }

    /// 协商器判定为预检请求后，无论它留下什么状态码，分发器都以 200 结束。
    #[tokio::test]
    async fn test_preflight_status_is_set_by_dispatcher() {
        let mut cors = MockCorsNegotiator::new();
        cors.expect_prepare_cors().times(1).returning(|_, response| {
            response
                .set_code(204)
                .set_header("Access-Control-Allow-Methods", "GET");
            true
        });
        let dispatcher = dispatcher(Config::new()).with_cors(cors);

        let request = Request::new(HttpRequestMethod::Options, "/api/account/counter", 1)
            .with_header("Access-Control-Request-Method", "GET");
        let ctx = run(&dispatcher, request).await;

        assert_eq!(ctx.response().status_code(), 200);
        assert!(ctx.response().content().is_empty());
        assert_eq!(ctx.response().header("Access-Control-Allow-Methods"), Some("GET"));
    }

    #[tokio::test]
    async fn test_cors_consulted_before_routing() {
        let mut cors = MockCorsNegotiator::new();
        cors.expect_prepare_cors()
            .withf(|request, response| {
                request.path() == "/api/account/counter" && response.content().is_empty()
            })
            .times(1)
            .returning(|_, response| {
                response.set_header("Access-Control-Allow-Origin", "https://example.com");
                false
            });
        let dispatcher = dispatcher(Config::new()).with_cors(cors);

        let request = Request::new(HttpRequestMethod::Get, "/api/account/counter", 1);
        let ctx = run(&dispatcher, request).await;
        assert_eq!(ctx.response().status_code(), 200);
        assert!(!ctx.response().content().is_empty());
        assert_eq!(
            ctx.response().header("Access-Control-Allow-Origin"),
            Some("https://example.com")
        );
    }

    #[tokio::test]
    async fn test_static_and_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("my-zone")).unwrap();
        std::fs::write(dir.path().join("my-zone").join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::write(dir.path().join("site.css"), "body{}").unwrap();
        std::fs::write(dir.path().join("a b.txt"), "spaced").unwrap();
        let config = www_config(dir.path());
        let dispatcher = dispatcher(config);

        let ctx = run(&dispatcher, get("/", 1)).await;
        assert_eq!(ctx.response().status_code(), 200);
        assert_eq!(ctx.response().content(), b"<h1>home</h1>");

        let ctx = run(&dispatcher, get("/www/site.css", 2)).await;
        assert_eq!(ctx.response().content(), b"body{}");
        assert_eq!(ctx.response().content_type(), Some("text/css;charset=utf-8"));

        let ctx = run(&dispatcher, get("/www/my-zone", 3)).await;
        assert_eq!(ctx.response().content(), b"<h1>home</h1>");

        let ctx = run(&dispatcher, get("/www/missing.js", 4)).await;
        assert_eq!(ctx.response().status_code(), 404);

        let ctx = run(&dispatcher, get("/www/../secret", 5)).await;
        assert_eq!(ctx.response().status_code(), 400);

        let ctx = run(&dispatcher, get("/www/a%20b.txt", 6)).await;
        assert_eq!(ctx.response().status_code(), 200);
        assert_eq!(ctx.response().content(), b"spaced");

        let ctx = run(&dispatcher, get("/www/%2e%2e/secret", 7)).await;
        assert_eq!(ctx.response().status_code(), 400);
    }

    #[tokio::test]
    async fn test_root_without_homepage_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let config = www_config(dir.path());
        let ctx = run(&dispatcher(config), get("/", 1)).await;
        assert_eq!(ctx.response().status_code(), 404);
    }

    #[tokio::test]
    async fn test_upload_without_multipart_is_400() {
        let dispatcher = dispatcher(Config::new());
        let ctx = run(&dispatcher, post("/upload/gallery", "plain")).await;

        assert_eq!(ctx.response().status_code(), 400);
        let body: String = serde_json::from_slice(ctx.response().content()).unwrap();
        assert_eq!(body, Exception::MalformedMultipart.to_string());
    }

    #[tokio::test]
    async fn test_handle_writes_response_and_returns_context() {
        let dispatcher = dispatcher(Config::new());
        let mut out = Vec::new();
        let code = dispatcher
            .handle(post("/api/account/login", r#"{"user":"bob","pass":"pw"}"#), &mut out)
            .await
            .unwrap();

        assert_eq!(code, 200);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("\"bob:2\"\n"));
        assert_eq!(dispatcher.pool().idle(), 1);
    }

    #[tokio::test]
    async fn test_head_request_omits_body() {
        let dispatcher = dispatcher(Config::new());
        let mut out = Vec::new();
        dispatcher
            .handle(Request::new(HttpRequestMethod::Head, "/api/account/counter", 1), &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("\r\n\r\n"));
        assert!(!text.contains("Content-Length: 0\r\n"));
    }
}
