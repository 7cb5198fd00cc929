//! Keyword and pattern scoring: the deterministic first classification stage.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use crate::domain::category::Category;
use crate::domain::classification::ClassificationResult;
use crate::domain::error::Result;

const ALERT_ERROR_TERMS: &[&str] = &["error", "exception", "fail", "timeout", "crash", "down"];
const ALERT_ERROR_TERMS_ZH: &[&str] = &["错误", "异常", "失败", "超时", "崩溃", "宕机"];
const ALERT_SEVERITY_TERMS: &[&str] = &["critical", "urgent", "severe", "warning", "alert"];
const ALERT_SEVERITY_TERMS_ZH: &[&str] = &["严重", "紧急", "告警", "警告", "关键"];
const ALERT_SYSTEM_TERMS: &[&str] = &["cpu", "memory", "disk", "network", "database", "service"];
const ALERT_SYSTEM_TERMS_ZH: &[&str] = &["内存", "磁盘", "数据库", "服务", "网络", "系统"];

const LOG_TERMS: &[&str] = &["log", "logs", "search", "query", "grep", "tail", "find"];
const LOG_TERMS_ZH: &[&str] = &["日志", "查询", "搜索", "查找"];
const LOG_APP_TERMS: &[&str] = &["application", "app", "service", "system"];
const LOG_APP_TERMS_ZH: &[&str] = &["应用", "应用程序", "服务", "系统"];

/// Explicit log operations, weighted on top of the base log score.
const EXPLICIT_LOG_OPS: &[&str] = &["search", "query", "grep", "tail", "搜索", "查询"];

const HYBRID_INDICATORS: &[&str] = &[
    "check",
    "investigate",
    "analyze",
    "debug",
    "troubleshoot",
    "检查",
    "调查",
    "分析",
    "调试",
    "排查",
];

const CRITICAL_TERM_WEIGHT: f64 = 0.1;
const EXPLICIT_LOG_OP_WEIGHT: f64 = 0.15;

/// Ticket identifiers: letter-prefixed project code, dash, number.
static TICKET_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][A-Z0-9_]*-\d+)\b").unwrap());

/// Per-category scores computed from one input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleScores {
    pub alert: f64,
    pub log: f64,
    pub hybrid: f64,
}

/// Deterministic keyword classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleClassifier;

impl RuleClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Ticket identifiers in order of appearance.
    pub fn ticket_ids(&self, text: &str) -> Vec<String> {
        TICKET_ID
            .captures_iter(text)
            .map(|c| c[1].to_string())
            .collect()
    }

    pub fn scores(&self, text: &str) -> RuleScores {
        let lower = text.to_lowercase();
        RuleScores {
            alert: alert_score(&lower),
            log: log_score(&lower),
            hybrid: hybrid_score(&lower),
        }
    }

    /// Classify `text`.
    ///
    /// Decision order: ticket id with any other signal → hybrid; ticket id
    /// alone → ticket; dominant alert score → alert; log score → log query;
    /// otherwise unknown.
    pub fn classify(&self, text: &str) -> Result<ClassificationResult> {
        let lower = text.to_lowercase();
        let tickets = self.ticket_ids(text);
        let RuleScores { alert, log, hybrid } = self.scores(text);

        let mut extracted = Map::new();

        if !tickets.is_empty() && (alert > 0.2 || log > 0.2 || hybrid > 0.3) {
            extracted.insert("ticket_ids".to_string(), serde_json::to_value(&tickets)?);
            extracted.insert("alert_score".to_string(), json!(alert));
            extracted.insert("log_score".to_string(), json!(log));
            extracted.insert("hybrid_score".to_string(), json!(hybrid));
            extracted.insert("has_alert_context".to_string(), json!(alert > 0.2));
            extracted.insert("has_log_context".to_string(), json!(log > 0.2));
            let confidence = (0.7 + (alert + log + hybrid) / 3.0).min(0.9);
            return Ok(ClassificationResult::new(
                Category::Hybrid,
                confidence,
                extracted,
                "ticket identifier present alongside other diagnostic signals",
            ));
        }

        if !tickets.is_empty() {
            extracted.insert("primary_ticket".to_string(), json!(tickets[0]));
            extracted.insert("ticket_ids".to_string(), serde_json::to_value(&tickets)?);
            return Ok(ClassificationResult::new(
                Category::Ticket,
                0.95,
                extracted,
                "ticket identifier present with no other diagnostic signal",
            ));
        }

        if alert > log && alert > 0.3 {
            extracted.insert("alert_score".to_string(), json!(alert));
            extracted.insert(
                "matched_keywords".to_string(),
                serde_json::to_value(matched(&lower, ALERT_TABLES))?,
            );
            return Ok(ClassificationResult::new(
                Category::Alert,
                alert.min(0.9),
                extracted,
                format!("alert keyword score {alert:.2}"),
            ));
        }

        if log > 0.3 {
            extracted.insert("log_score".to_string(), json!(log));
            extracted.insert(
                "matched_keywords".to_string(),
                serde_json::to_value(matched(&lower, LOG_TABLES))?,
            );
            return Ok(ClassificationResult::new(
                Category::LogQuery,
                log.min(0.9),
                extracted,
                format!("log query keyword score {log:.2}"),
            ));
        }

        extracted.insert("alert_score".to_string(), json!(alert));
        extracted.insert("log_score".to_string(), json!(log));
        extracted.insert("text_length".to_string(), Value::from(text.chars().count()));
        Ok(ClassificationResult::new(
            Category::Unknown,
            0.4,
            extracted,
            "no category signal matched",
        ))
    }
}

const ALERT_TABLES: &[&[&str]] = &[
    ALERT_ERROR_TERMS,
    ALERT_ERROR_TERMS_ZH,
    ALERT_SEVERITY_TERMS,
    ALERT_SEVERITY_TERMS_ZH,
    ALERT_SYSTEM_TERMS,
    ALERT_SYSTEM_TERMS_ZH,
];

const LOG_TABLES: &[&[&str]] = &[LOG_TERMS, LOG_TERMS_ZH, LOG_APP_TERMS, LOG_APP_TERMS_ZH];

fn count_hits(text: &str, terms: &[&str]) -> usize {
    terms.iter().filter(|t| text.contains(*t)).count()
}

/// Fraction of table keywords present in `text`.
fn hit_ratio(text: &str, tables: &[&[&str]]) -> f64 {
    let total: usize = tables.iter().map(|t| t.len()).sum();
    if total == 0 {
        return 0.0;
    }
    let hits: usize = tables.iter().map(|t| count_hits(text, t)).sum();
    hits as f64 / total as f64
}

fn matched(text: &str, tables: &[&[&str]]) -> Vec<String> {
    tables
        .iter()
        .flat_map(|t| t.iter())
        .filter(|kw| text.contains(*kw))
        .map(|kw| kw.to_string())
        .collect()
}

fn alert_score(text: &str) -> f64 {
    let critical = count_hits(text, ALERT_ERROR_TERMS) + count_hits(text, ALERT_ERROR_TERMS_ZH);
    (hit_ratio(text, ALERT_TABLES) + critical as f64 * CRITICAL_TERM_WEIGHT).min(1.0)
}

fn log_score(text: &str) -> f64 {
    let explicit = count_hits(text, EXPLICIT_LOG_OPS);
    (hit_ratio(text, LOG_TABLES) + explicit as f64 * EXPLICIT_LOG_OP_WEIGHT).min(1.0)
}

fn hybrid_score(text: &str) -> f64 {
    (count_hits(text, HYBRID_INDICATORS) as f64 / HYBRID_INDICATORS.len() as f64).min(1.0)
}
