use serde::{Deserialize, Serialize};

/// 関連性判定のキーワード規則
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevanceRuleSet {
    #[serde(default)]
    pub include_keywords: Vec<String>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
}

impl RelevanceRuleSet {
    pub fn new(include_keywords: Vec<String>, exclude_keywords: Vec<String>) -> Self {
        Self {
            include_keywords,
            exclude_keywords,
        }
    }

    /// テキストが話題に関連するかを判定する
    ///
    /// 除外キーワードを先に評価し、1つでも含まれれば不採用。
    /// 次に採用キーワードのいずれかを含めば採用。採用キーワードが
    /// 未設定なら常に不採用。判定は大文字小文字を区別する部分一致。
    pub fn is_relevant(&self, text: &str) -> bool {
        if contains_any(text, &self.exclude_keywords) {
            return false;
        }
        contains_any(text, &self.include_keywords)
    }
}

/// 空文字のキーワードは全てに一致してしまうため無視する
fn contains_any(text: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .filter(|keyword| !keyword.is_empty())
        .any(|keyword| text.contains(keyword.as_str()))
}
