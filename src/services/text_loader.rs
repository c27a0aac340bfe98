//! 文档读取服务
//!
//! 只负责"把参与者目录读成 (文档ID, 文本)"，不关心检测流程。
//! 目录结构：`<input>/<参与者>/<文档>.txt|.docx`
//!
//! 文档ID 在这里一次性确定（文件名去掉扩展名和方括号），之后内存记录和
//! 持久化报告使用同一个 ID。同一参与者下 ID 冲突的文件只保留一个。

use docx_rs::{DocumentChild, Paragraph, ParagraphChild, RunChild};
use phf::phf_map;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::fs;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult, ExhaustionError};
use crate::models::{DetectionRequest, ParticipantDocuments};

/// 常见的编码错乱片段 → 修正
static MOJIBAKE: phf::Map<&'static str, &'static str> = phf_map! {
    "â€™" => "'",
    "â€\"" => "-",
    "â€œ" => "\"",
    "â€" => "\"",
    "\u{96}" => "-",
    "\u{93}" => "\"",
    "\u{94}" => "\"",
    "…" => "...",
};

/// 被替换成问号的引号：`?文本?` → `"文本"`
fn broken_quotes_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\?([^?]+)\?").expect("broken quotes regex"))
}

fn spaces_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" +").expect("spaces regex"))
}

fn newlines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n+").expect("newlines regex"))
}

/// 修正编码错乱、去掉控制/格式/私用字符、合并多余空白
pub fn normalize_text(text: &str) -> String {
    let text = broken_quotes_re().replace_all(text, "\"$1\"");

    // 长的片段先替换，避免 "â€" 抢先匹配 "â€™"
    let mut patterns: Vec<(&str, &str)> = MOJIBAKE.entries().map(|(k, v)| (*k, *v)).collect();
    patterns.sort_by_key(|(k, _)| std::cmp::Reverse(k.chars().count()));
    let mut text = text.into_owned();
    for (broken, fixed) in patterns {
        text = text.replace(broken, fixed);
    }

    let text: String = text.chars().filter(|c| !is_stripped_char(*c)).collect();
    let text = spaces_re().replace_all(&text, " ");
    let text = newlines_re().replace_all(&text, "\n");
    text.trim().to_string()
}

/// Unicode "C" 大类中需要去掉的字符（换行和制表符除外）
fn is_stripped_char(c: char) -> bool {
    if c == '\n' || c == '\t' {
        return false;
    }
    c.is_control() || is_format_char(c) || is_private_use(c) || is_noncharacter(c)
}

/// Cf 格式字符
fn is_format_char(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{0600}'..='\u{0605}'
            | '\u{061C}'
            | '\u{06DD}'
            | '\u{070F}'
            | '\u{08E2}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
            | '\u{110BD}'
            | '\u{110CD}'
            | '\u{13430}'..='\u{1343F}'
            | '\u{1BCA0}'..='\u{1BCA3}'
            | '\u{1D173}'..='\u{1D17A}'
            | '\u{E0001}'
            | '\u{E0020}'..='\u{E007F}'
    )
}

/// Co 私用区
fn is_private_use(c: char) -> bool {
    matches!(
        c,
        '\u{E000}'..='\u{F8FF}' | '\u{F0000}'..='\u{FFFFD}' | '\u{100000}'..='\u{10FFFD}'
    )
}

/// 非字符码位（Cn 中固定保留的部分）
fn is_noncharacter(c: char) -> bool {
    matches!(c, '\u{FDD0}'..='\u{FDEF}') || (c as u32) & 0xFFFE == 0xFFFE
}

/// UTF-8 解码，失败时按 Latin-1 逐字节解码
fn decode(bytes: Vec<u8>, path: &Path) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!("文件 {} 不是 UTF-8，改用 Latin-1 解码", path.display());
            e.into_bytes().into_iter().map(char::from).collect()
        }
    }
}

/// 读取 .docx 正文段落，按换行拼接
fn docx_text(bytes: &[u8]) -> Result<String, docx_rs::ReaderError> {
    let docx = docx_rs::read_docx(bytes)?;
    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(paragraph) => Some(paragraph_text(paragraph)),
            _ => None,
        })
        .collect();
    Ok(paragraphs.join("\n"))
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                match run_child {
                    RunChild::Text(t) => text.push_str(&t.text),
                    RunChild::Tab(_) => text.push('\t'),
                    _ => {}
                }
            }
        }
    }
    text
}

/// 支持的文档格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentFormat {
    Text,
    Word,
}

impl DocumentFormat {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("txt") {
            Some(DocumentFormat::Text)
        } else if ext.eq_ignore_ascii_case("docx") {
            Some(DocumentFormat::Word)
        } else {
            None
        }
    }
}

/// 文档ID：文件名去掉扩展名，并去掉方括号
pub fn document_id_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().replace(['[', ']'], ""))
        .unwrap_or_default()
}

/// 按文档ID去重（输入已按文件名排序）
///
/// ID 冲突时 .txt 优先于 .docx；格式相同则保留文件名靠前的一个。
fn unique_documents(files: Vec<PathBuf>) -> Vec<(String, PathBuf, DocumentFormat)> {
    let mut documents: Vec<(String, PathBuf, DocumentFormat)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for path in files {
        let Some(format) = DocumentFormat::from_path(&path) else {
            continue;
        };
        let document_id = document_id_for(&path);
        match index.get(&document_id).copied() {
            None => {
                index.insert(document_id.clone(), documents.len());
                documents.push((document_id, path, format));
            }
            Some(i) => {
                let kept = &mut documents[i];
                if kept.2 == DocumentFormat::Word && format == DocumentFormat::Text {
                    warn!(
                        "⚠️ 文档ID {} 重复：使用 {}，忽略 {}",
                        document_id,
                        path.display(),
                        kept.1.display()
                    );
                    kept.1 = path;
                    kept.2 = format;
                } else {
                    warn!(
                        "⚠️ 文档ID {} 重复：使用 {}，忽略 {}",
                        document_id,
                        kept.1.display(),
                        path.display()
                    );
                }
            }
        }
    }
    documents
}

/// 文档读取服务
pub struct TextLoader {
    input_folder: PathBuf,
    /// 输入目录下需要跳过的子目录（报告目录）
    skip_folder: Option<PathBuf>,
}

impl TextLoader {
    pub fn new(input_folder: impl Into<PathBuf>) -> Self {
        Self {
            input_folder: input_folder.into(),
            skip_folder: None,
        }
    }

    pub fn skipping(mut self, folder: impl Into<PathBuf>) -> Self {
        self.skip_folder = Some(folder.into());
        self
    }

    /// 读取所有参与者（或指定参与者）的文档
    ///
    /// 参与者和文档都按名称排序；没有文档的参与者会被跳过。
    pub async fn load(&self, participant_filter: Option<&str>) -> AppResult<Vec<ParticipantDocuments>> {
        if !self.input_folder.is_dir() {
            return Err(ExhaustionError::InputFolderMissing {
                path: self.input_folder.display().to_string(),
            }
            .into());
        }
        info!("📁 正在扫描输入目录: {}", self.input_folder.display());

        let folders = match participant_filter {
            Some(name) => {
                let folder = self.input_folder.join(name);
                if !folder.is_dir() {
                    return Err(ExhaustionError::ParticipantMissing {
                        participant: name.to_string(),
                    }
                    .into());
                }
                vec![folder]
            }
            None => self.participant_folders().await?,
        };

        let mut participants = Vec::new();
        for folder in folders {
            let participant_id = folder
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            info!("正在读取参与者: {}", participant_id);

            let documents = self.load_documents(&folder).await?;
            if documents.is_empty() {
                warn!("参与者 {} 没有找到任何文档，已跳过", participant_id);
                continue;
            }
            info!("参与者 {}: {} 个文档", participant_id, documents.len());
            participants.push(ParticipantDocuments {
                participant_id,
                documents,
            });
        }

        if participants.is_empty() {
            return Err(ExhaustionError::NoParticipants {
                path: self.input_folder.display().to_string(),
            }
            .into());
        }
        Ok(participants)
    }

    async fn participant_folders(&self) -> AppResult<Vec<PathBuf>> {
        // 路径写法可能不同（"./documents" 与 "documents/reports"），按规范化路径比较
        let skip = match &self.skip_folder {
            Some(folder) => fs::canonicalize(folder).await.ok(),
            None => None,
        };

        let mut folders = Vec::new();
        let mut entries = fs::read_dir(&self.input_folder)
            .await
            .map_err(|e| AppError::file_read_failed(self.input_folder.display().to_string(), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::file_read_failed(self.input_folder.display().to_string(), e))?
        {
            let path = entry.path();
            if !path.is_dir() || is_hidden(&path) {
                continue;
            }
            if let Some(skip) = &skip {
                if fs::canonicalize(&path).await.ok().as_ref() == Some(skip) {
                    continue;
                }
            }
            folders.push(path);
        }
        folders.sort();
        Ok(folders)
    }

    async fn load_documents(&self, folder: &Path) -> AppResult<Vec<DetectionRequest>> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(folder)
            .await
            .map_err(|e| AppError::file_read_failed(folder.display().to_string(), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::file_read_failed(folder.display().to_string(), e))?
        {
            let path = entry.path();
            if path.is_file() && DocumentFormat::from_path(&path).is_some() {
                files.push(path);
            }
        }
        files.sort();

        let mut documents = Vec::with_capacity(files.len());
        for (document_id, path, format) in unique_documents(files) {
            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("读取文件失败 {}: {}", path.display(), e);
                    continue;
                }
            };
            let raw = match format {
                DocumentFormat::Text => decode(bytes, &path),
                DocumentFormat::Word => match docx_text(&bytes) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("解析 docx 失败 {}: {}", path.display(), e);
                        continue;
                    }
                },
            };
            documents.push(DetectionRequest::new(document_id, normalize_text(&raw)));
        }
        Ok(documents)
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}
