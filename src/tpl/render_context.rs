use crate::tpl::path;
use crate::value::Value;
use std::borrow::Cow;
use std::collections::HashSet;

/// 一次顶层渲染中已经展开过的 include 路径，嵌套 include 共享同一集合
pub type IncludeSet = HashSet<String>;

/// 渲染帧：当前模板源文本、输出片段以及已输出到的位置。
///
/// `data` 与 include 集合按引用贯穿整棵渲染树（包括嵌套 include），
/// 因此循环变量与 `set` 写入对后续标签可见。hook 以该帧作为接收者。
pub struct Frame<'a> {
    source: &'a str,
    data: &'a mut Value,
    visited: &'a mut IncludeSet,
    pieces: Vec<Cow<'a, str>>,
    cursor: usize,
}

impl<'a> Frame<'a> {
    pub fn new(source: &'a str, data: &'a mut Value, visited: &'a mut IncludeSet) -> Self {
        Self {
            source,
            data,
            visited,
            pieces: Vec::new(),
            cursor: 0,
        }
    }

    /// 为嵌套模板创建新帧，共享 data 与 include 集合
    pub(crate) fn child<'b>(&'b mut self, source: &'b str) -> Frame<'b> {
        Frame::new(source, &mut *self.data, &mut *self.visited)
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn data(&self) -> &Value {
        self.data
    }

    pub fn data_mut(&mut self) -> &mut Value {
        self.data
    }

    pub fn lookup(&self, path: &str) -> Option<&Value> {
        path::read(path, self.data)
    }

    pub fn assign(&mut self, path: &str, value: impl Into<Value>) {
        path::write(path, value.into(), self.data);
    }

    /// 追加一段输出
    pub fn push(&mut self, fragment: impl Into<String>) {
        let fragment = fragment.into();
        if !fragment.is_empty() {
            self.pieces.push(Cow::Owned(fragment));
        }
    }

    pub fn visited(&self) -> &IncludeSet {
        self.visited
    }

    pub(crate) fn visited_mut(&mut self) -> &mut IncludeSet {
        self.visited
    }

    /// 将游标到 `pos` 之间的原文原样输出
    pub(crate) fn flush_to(&mut self, pos: usize) {
        if pos > self.cursor {
            let source = self.source;
            self.pieces.push(Cow::Borrowed(&source[self.cursor..pos]));
            self.cursor = pos;
        }
    }

    /// 跳过 `pos` 之前尚未输出的原文（标签语法、未选中的分支）
    pub(crate) fn seek(&mut self, pos: usize) {
        self.cursor = pos;
    }

    pub(crate) fn finish(mut self) -> String {
        self.flush_to(self.source.len());
        self.pieces.concat()
    }
}
