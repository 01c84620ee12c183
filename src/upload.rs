// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 文件上传
//!
//! 处理 `/upload/*` 下的 `multipart/form-data` 请求：取出 `uploadfile` 字段中的文件，
//! 按 URL 路径在静态资源目录下确定存放目录，用「时间戳 + 原文件名」的 MD5 生成
//! 不易冲突的文件名并保留原扩展名，最后把生成的路径以 JSON 字符串返回给客户端。

use crate::{context::RequestContext, exception::Exception, param::UPLOAD_FIELD};

use bytes::Bytes;
use chrono::Utc;
use lazy_static::lazy_static;
use log::debug;
use md5::{Digest, Md5};
use regex::Regex;
use tokio::io::AsyncWriteExt;

use std::path::{Path, PathBuf};

lazy_static! {
    static ref BOUNDARY: Regex = Regex::new(r#"(?i)boundary="?([^";]+)"?"#).unwrap();
    static ref DISPOSITION_PARAM: Regex = Regex::new(r#"(?i)\b(name|filename)="([^"]*)""#).unwrap();
}

/// multipart 表单中的一个文件
#[derive(Debug, Clone)]
pub struct UploadedFile {
    file_name: String,
    content_type: Option<String>,
    data: Bytes,
}

impl UploadedFile {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

/// 从 multipart 请求体中取出名为 `field` 的文件。
///
/// 同名字段出现多次时取第一个文件。没有 `filename` 参数的同名字段视为普通表单值并跳过。
pub fn parse_multipart(
    body: &Bytes,
    content_type: &str,
    field: &str,
) -> Result<UploadedFile, Exception> {
    if !content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
    {
        return Err(Exception::MalformedMultipart);
    }
    let boundary = BOUNDARY
        .captures(content_type)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .ok_or(Exception::MalformedMultipart)?;
    let delimiter = format!("--{}", boundary).into_bytes();
    let separator = format!("\r\n--{}", boundary).into_bytes();

    let mut cursor =
        find(body, &delimiter, 0).ok_or(Exception::MalformedMultipart)? + delimiter.len();
    loop {
        // 结束分隔符 "--boundary--"
        if body[cursor..].starts_with(b"--") {
            return Err(Exception::MissingUploadFile);
        }
        let part_start = match body[cursor..].starts_with(b"\r\n") {
            true => cursor + 2,
            false => return Err(Exception::MalformedMultipart),
        };
        let headers_end =
            find(body, b"\r\n\r\n", part_start).ok_or(Exception::MalformedMultipart)?;
        let content_start = headers_end + 4;
        let content_end =
            find(body, &separator, content_start).ok_or(Exception::MalformedMultipart)?;

        let headers = std::str::from_utf8(&body[part_start..headers_end])
            .map_err(|_| Exception::MalformedMultipart)?;
        let mut name = None;
        let mut file_name = None;
        let mut part_type = None;
        for line in headers.split("\r\n") {
            let (key, value) = match line.split_once(':') {
                Some(kv) => kv,
                None => continue,
            };
            if key.trim().eq_ignore_ascii_case("Content-Disposition") {
                for cap in DISPOSITION_PARAM.captures_iter(value) {
                    match cap[1].to_ascii_lowercase().as_str() {
                        "name" => name = Some(cap[2].to_string()),
                        _ => file_name = Some(cap[2].to_string()),
                    }
                }
            } else if key.trim().eq_ignore_ascii_case("Content-Type") {
                part_type = Some(value.trim().to_string());
            }
        }

        if name.as_deref() == Some(field) {
            if let Some(file_name) = file_name {
                return Ok(UploadedFile {
                    file_name,
                    content_type: part_type,
                    data: body.slice(content_start..content_end),
                });
            }
        }
        cursor = content_end + separator.len();
    }
}

/// 生成上传文件的存放路径。
///
/// URL 路径（去掉开头的 `/`）中的每一段映射为 `root` 下的一级目录，文件名为
/// `md5(时间戳 + 原文件名第一个 '.' 之前的部分)` 加原文件的最后一个扩展名。
/// 浏览器可能发送带目录的文件名，只取最后一段。
pub fn upload_file_name(
    root: &Path,
    url: &str,
    file_name: &str,
    timestamp: i64,
) -> Result<PathBuf, Exception> {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    if base.is_empty() {
        return Err(Exception::EmptyFileName);
    }

    let url = url.strip_prefix('/').unwrap_or(url);
    let folders: Vec<&str> = if url.contains('/') {
        url.split('/').collect()
    } else if url.contains('\\') {
        url.split('\\').collect()
    } else {
        vec![url]
    };
    let mut dir = root.to_path_buf();
    for folder in folders {
        match folder {
            "" | "." => continue,
            ".." => return Err(Exception::InvalidPath),
            f => dir.push(f),
        }
    }

    let infos: Vec<&str> = base.split('.').collect();
    let extension = infos[infos.len() - 1];
    if infos.len() == 1 || extension.is_empty() {
        return Err(Exception::UnsupportedFileFormat);
    }

    let mut hasher = Md5::new();
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(infos[0].as_bytes());
    let name = format!("{:x}.{}", hasher.finalize(), extension);

    Ok(dir.join(name))
}

/// 保存请求中的上传文件，返回生成的存放路径。
pub async fn save_upload(ctx: &RequestContext, root: &Path) -> Result<String, Exception> {
    let request = ctx.request();
    let content_type = request.content_type().ok_or(Exception::MalformedMultipart)?;
    let file = parse_multipart(request.body(), content_type, UPLOAD_FIELD)?;
    debug!(
        "[ID{}]收到上传文件：{}，类型：{:?}，大小：{} bytes",
        request.id(),
        file.file_name(),
        file.content_type(),
        file.data().len()
    );

    let path = upload_file_name(root, request.path(), file.file_name(), Utc::now().timestamp())?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut dst = tokio::fs::File::create(&path).await?;
    dst.write_all(file.data()).await?;
    dst.flush().await?;

    Ok(path.to_string_lossy().replace('\\', "/"))
}
