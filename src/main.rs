// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 控制器路由服务器
//!
//! 初始化日志与配置，注册控制器，然后在 Tokio 多线程运行时上启动主事件循环。
//! 标准输入提供一个简单的管理控制台（`stop` / `status` / `routes` / `help`）。

mod account;

use account::AccountController;
use webrouter::{server, Config, Dispatcher, ServerState};

use log::{error, info, warn};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
    runtime::Builder,
};

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    sync::Arc,
};

const LOG_CONFIG: &str = "config/log4rs.yaml";
const APP_CONFIG: &str = "config/development.toml";

fn main() {
    // 日志配置缺失时继续运行，只是不输出日志
    if let Err(e) = log4rs::init_file(LOG_CONFIG, Default::default()) {
        eprintln!("无法初始化日志系统（{}）：{}", LOG_CONFIG, e);
    }

    let config = match Config::from_toml(APP_CONFIG) {
        Ok(config) => {
            info!("配置文件已载入");
            config
        }
        Err(e) => {
            warn!("{}，使用默认配置", e);
            Config::new()
        }
    };
    info!("www root: {}", config.www_root());

    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建异步运行时：{}", e);
            eprintln!("无法创建异步运行时：{}", e);
            std::process::exit(1);
        }
    };
    runtime.block_on(run(config));
}

async fn run(config: Config) {
    let config = Arc::new(config);

    let mut dispatcher = Dispatcher::new(Arc::clone(&config));
    dispatcher.register::<AccountController>();
    let dispatcher = Arc::new(dispatcher);

    let port = config.port();
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    info!("服务端将在{}:{}上监听Socket连接", address, port);
    let listener = match TcpListener::bind(SocketAddrV4::new(address, port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            return;
        }
    };
    info!("端口{}绑定完成", port);

    let state = Arc::new(ServerState::new());
    tokio::spawn(console(Arc::clone(&state), Arc::clone(&dispatcher)));

    server::serve(listener, dispatcher, state).await;
}

/// 后台管理控制台
async fn console(state: Arc<ServerState>, dispatcher: Arc<Dispatcher>) {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    loop {
        input.clear();
        match reader.read_line(&mut input).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match input.trim() {
            "stop" => {
                state.stop();
                println!("停机指令已激活，服务器不再接收新连接。");
                break;
            }
            "status" => {
                let pool = dispatcher.pool();
                println!("== Webrouter 状态 ===");
                println!("当前活跃连接数: {}", state.active_connections());
                println!("已注册路由数: {}", dispatcher.routes().len());
                println!("上下文池: 空闲{}，累计创建{}", pool.idle(), pool.created());
                println!("====================");
            }
            "routes" => {
                for pattern in dispatcher.routes().patterns() {
                    println!("{}", pattern);
                }
            }
            "help" => {
                println!("== Webrouter Help ==");
                println!("stop   - 发出停机信号");
                println!("status - 查看当前服务器运行状态");
                println!("routes - 列出已注册的API路由");
                println!("help   - 显示此帮助信息");
                println!("====================");
            }
            "" => {}
            cmd => println!("无效的命令：{}", cmd),
        }
    }
}
