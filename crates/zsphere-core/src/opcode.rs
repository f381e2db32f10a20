//! 操作码文本格式
//!
//! 一条操作码形如 `Tag&key=value&key=value`：
//! - 第一个字段是命令标签
//! - 值中的 `% & = / , ;` 与控制字符按 `%XX` 转义
//! - 列表值把逐个转义后的元素用 `/` 连接
//! - 向量写作 `x,y,z`，标量与向量分量都使用固定的小数位数
//!
//! [`NameRegistry`] 在回放时把名称解析为节点句柄。

use crate::error::OpcodeError;
use crate::math::{self, Vector3};
use crate::node::NodeId;
use std::collections::BTreeMap;

/// 名称注册表
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    names: BTreeMap<String, NodeId>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, id: NodeId) {
        self.names.insert(name.into(), id);
    }

    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// 解析名称，未注册时报告 `UnknownName`
    pub fn resolve(&self, name: &str) -> Result<NodeId, OpcodeError> {
        self.get(name)
            .ok_or_else(|| OpcodeError::UnknownName(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

fn needs_escape(c: char) -> bool {
    matches!(c, '%' | '&' | '=' | '/' | ',' | ';') || c.is_control()
}

/// 转义值中的分隔符
pub fn encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if needs_escape(c) {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02X}", byte));
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// 还原 [`encode`] 的转义
pub fn decode(value: &str) -> Result<String, OpcodeError> {
    let bad = || OpcodeError::BadEscape(value.to_string());
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = value.get(i + 1..i + 3).ok_or_else(bad)?;
            out.push(u8::from_str_radix(hex, 16).map_err(|_| bad())?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| bad())
}

/// 操作码构造器
#[derive(Debug, Clone)]
pub struct OpcodeBuilder {
    text: String,
    precision: usize,
}

impl OpcodeBuilder {
    pub fn new(tag: &str, precision: usize) -> Self {
        Self {
            text: tag.to_string(),
            precision,
        }
    }

    fn raw(mut self, key: &str, raw: &str) -> Self {
        self.text.push('&');
        self.text.push_str(key);
        self.text.push('=');
        self.text.push_str(raw);
        self
    }

    pub fn text(self, key: &str, value: &str) -> Self {
        let encoded = encode(value);
        self.raw(key, &encoded)
    }

    pub fn flag(self, key: &str, value: bool) -> Self {
        self.raw(key, if value { "true" } else { "false" })
    }

    pub fn integer(self, key: &str, value: u64) -> Self {
        let value = value.to_string();
        self.raw(key, &value)
    }

    pub fn scalar(self, key: &str, value: f64) -> Self {
        let value = math::format_scalar(value, self.precision);
        self.raw(key, &value)
    }

    pub fn vector(self, key: &str, value: &Vector3) -> Self {
        let value = math::format_vector(value, self.precision);
        self.raw(key, &value)
    }

    /// 文本列表，元素逐个转义后以 `/` 连接
    pub fn list<S: AsRef<str>>(self, key: &str, items: &[S]) -> Self {
        let joined = items
            .iter()
            .map(|item| encode(item.as_ref()))
            .collect::<Vec<_>>()
            .join("/");
        self.raw(key, &joined)
    }

    /// 元组列表：元组内各分量转义后以 `,` 连接，元组之间以 `/` 连接
    pub fn tuples(self, key: &str, items: &[Vec<String>]) -> Self {
        let joined = items
            .iter()
            .map(|parts| parts.iter().map(|p| encode(p)).collect::<Vec<_>>().join(","))
            .collect::<Vec<_>>()
            .join("/");
        self.raw(key, &joined)
    }

    pub fn scalars(self, key: &str, values: &[f64]) -> Self {
        let precision = self.precision;
        let items: Vec<String> = values
            .iter()
            .map(|v| math::format_scalar(*v, precision))
            .collect();
        self.list(key, &items)
    }

    pub fn build(self) -> String {
        self.text
    }
}

/// 解析后的操作码字段
#[derive(Debug, Clone)]
pub struct OpcodeFields {
    tag: String,
    fields: BTreeMap<String, String>,
}

impl OpcodeFields {
    pub fn parse(text: &str) -> Result<Self, OpcodeError> {
        let mut parts = text.split('&');
        let tag = match parts.next() {
            Some(tag) if !tag.trim().is_empty() => tag.trim().to_string(),
            _ => return Err(OpcodeError::Empty),
        };
        let mut fields = BTreeMap::new();
        for part in parts {
            let (key, value) = part.split_once('=').ok_or_else(|| OpcodeError::BadValue {
                field: tag.clone(),
                value: part.to_string(),
            })?;
            fields.insert(key.to_string(), value.to_string());
        }
        Ok(Self { tag, fields })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn raw(&self, key: &str) -> Result<&str, OpcodeError> {
        self.fields
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| OpcodeError::MissingField(key.to_string()))
    }

    fn bad(key: &str, value: &str) -> OpcodeError {
        OpcodeError::BadValue {
            field: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn text(&self, key: &str) -> Result<String, OpcodeError> {
        decode(self.raw(key)?)
    }

    pub fn optional_text(&self, key: &str) -> Result<Option<String>, OpcodeError> {
        match self.fields.get(key) {
            Some(raw) => decode(raw).map(Some),
            None => Ok(None),
        }
    }

    pub fn flag(&self, key: &str) -> Result<bool, OpcodeError> {
        match self.raw(key)? {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(Self::bad(key, other)),
        }
    }

    pub fn integer<T: std::str::FromStr>(&self, key: &str) -> Result<T, OpcodeError> {
        let raw = self.raw(key)?;
        raw.parse().map_err(|_| Self::bad(key, raw))
    }

    pub fn scalar(&self, key: &str) -> Result<f64, OpcodeError> {
        let raw = self.raw(key)?;
        raw.parse().map_err(|_| Self::bad(key, raw))
    }

    pub fn vector(&self, key: &str) -> Result<Vector3, OpcodeError> {
        let raw = self.raw(key)?;
        math::parse_vector(raw).ok_or_else(|| Self::bad(key, raw))
    }

    pub fn list(&self, key: &str) -> Result<Vec<String>, OpcodeError> {
        let raw = self.raw(key)?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        raw.split('/').map(decode).collect()
    }

    pub fn tuples(&self, key: &str) -> Result<Vec<Vec<String>>, OpcodeError> {
        let raw = self.raw(key)?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        raw.split('/')
            .map(|item| item.split(',').map(decode).collect())
            .collect()
    }

    pub fn scalars(&self, key: &str) -> Result<Vec<f64>, OpcodeError> {
        self.list(key)?
            .into_iter()
            .map(|item| item.parse().map_err(|_| Self::bad(key, &item)))
            .collect()
    }
}
