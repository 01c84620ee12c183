// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接层
//!
//! 负责 TCP 连接的接收、完整请求报文的读取以及连接计数与停机信号。
//! 每个连接只处理一个请求，响应携带 `Connection: close`。

use crate::{
    dispatcher::Dispatcher,
    exception::Exception,
    request::{find_header_end, Request},
    response::Response,
};

use bytes::BytesMut;
use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
    sync::Notify,
};

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

/// 单次读取的缓冲区增量
const READ_CHUNK: usize = 4096;
/// 请求头的最大长度
const MAX_HEADER_SIZE: usize = 64 * 1024;

/// 服务器运行状态：活跃连接计数与停机信号
#[derive(Debug, Default)]
pub struct ServerState {
    active_connection: AtomicU32,
    shutdown: Notify,
}

impl ServerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_connections(&self) -> u32 {
        self.active_connection.load(Ordering::SeqCst)
    }

    /// 发出停机信号，主循环不再接收新连接。
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }
}

/// 从流中读取一个完整的请求（请求头加 `Content-Length` 指定长度的请求体）。
///
/// 客户端在发送任何数据之前关闭连接时返回 `Ok(None)`。
pub async fn read_request<R: AsyncRead + Unpin>(
    stream: &mut R,
    id: u128,
    max_body_size: usize,
) -> Result<Option<Request>, Exception> {
    let mut buffer = BytesMut::with_capacity(READ_CHUNK);

    let header_end = loop {
        if let Some(pos) = find_header_end(&buffer) {
            break pos;
        }
        if buffer.len() > MAX_HEADER_SIZE {
            error!("[ID{}]请求头超过{}字节", id, MAX_HEADER_SIZE);
            return Err(Exception::MalformedRequest);
        }
        buffer.reserve(READ_CHUNK);
        if stream.read_buf(&mut buffer).await? == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            error!("[ID{}]请求头不完整，连接已关闭", id);
            return Err(Exception::MalformedRequest);
        }
    };
    let body_start = header_end + 4;

    let request = Request::try_from(&buffer[..body_start], id)?;
    if request
        .header("Transfer-Encoding")
        .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"))
    {
        warn!("[ID{}]不支持分块传输的请求体", id);
        return Err(Exception::MalformedRequest);
    }
    let content_length = match request.header("Content-Length") {
        None => 0,
        Some(value) => value.trim().parse::<usize>().map_err(|_| {
            warn!("[ID{}]无法解析的Content-Length：{}", id, value);
            Exception::MalformedRequest
        })?,
    };
    if content_length > max_body_size {
        warn!(
            "[ID{}]请求体长度{}超过上限{}，返回413",
            id, content_length, max_body_size
        );
        return Err(Exception::PayloadTooLarge);
    }

    while buffer.len() < body_start + content_length {
        buffer.reserve(READ_CHUNK);
        if stream.read_buf(&mut buffer).await? == 0 {
            error!(
                "[ID{}]请求体不完整：期望{}字节，收到{}字节",
                id,
                content_length,
                buffer.len() - body_start
            );
            return Err(Exception::MalformedRequest);
        }
    }

    let body = buffer.split_off(body_start).freeze().slice(..content_length);
    debug!("[ID{}]HTTP请求接收完毕，请求体{}字节", id, body.len());
    Ok(Some(request.with_body(body)))
}

/// # 连接处理器
///
/// 读取请求、交给分发器处理并写回响应。读取阶段的错误直接转换为错误页。
pub async fn handle_connection<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    id: u128,
    dispatcher: &Dispatcher,
) {
    let request = match read_request(stream, id, dispatcher.config().max_body_size()).await {
        Ok(Some(request)) => request,
        Ok(None) => {
            debug!("[ID{}]客户端未发送数据即关闭连接", id);
            return;
        }
        Err(e) => {
            warn!("[ID{}]读取HTTP请求失败：{}", id, e);
            let mut response = Response::new();
            response.error_page(e.status_code(), None);
            if let Err(e) = stream.write_all(&response.as_bytes()).await {
                debug!("[ID{}]发送错误响应失败：{}", id, e);
            }
            let _ = stream.flush().await;
            return;
        }
    };
    debug!("[ID{}]成功解析HTTP请求", id);

    if let Err(e) = dispatcher.handle(request, stream).await {
        error!("[ID{}]发送响应失败：{}", id, e);
    }
}

/// # 主事件循环
///
/// 持续接收新连接并交给 Tokio 任务处理，直到收到停机信号。
pub async fn serve(listener: TcpListener, dispatcher: Arc<Dispatcher>, state: Arc<ServerState>) {
    let mut id: u128 = 0;
    loop {
        let accepted = tokio::select! {
            _ = state.shutdown.notified() => {
                info!("主循环接收到停机指令，正在退出...");
                break;
            }
            accepted = listener.accept() => accepted,
        };
        let (mut stream, addr) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                error!("接受TCP连接失败：{}", e);
                continue;
            }
        };
        debug!("[ID{}]TCP连接已建立：{}", id, addr);

        let dispatcher = Arc::clone(&dispatcher);
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            state.active_connection.fetch_add(1, Ordering::SeqCst);
            handle_connection(&mut stream, id, &dispatcher).await;
            state.active_connection.fetch_sub(1, Ordering::SeqCst);
        });
        id += 1;
    }
}
