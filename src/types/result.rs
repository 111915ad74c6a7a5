/// 1回の実行結果の詳細情報
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// 日次集計を投稿したか
    pub summary_posted: bool,
    /// 取得した記事数（一覧ページは重複除外前、フィードは関連性判定後）
    pub fetched: usize,
    /// 台帳にない新規記事数
    pub new: usize,
    /// 投稿に成功した件数
    pub published: usize,
    /// 投稿に失敗した件数
    pub failed: usize,
    /// 保存後の台帳件数
    pub ledger_size: usize,
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "処理完了: 取得{}件、新規{}件、投稿成功{}件、投稿失敗{}件、台帳{}件{}",
            self.fetched,
            self.new,
            self.published,
            self.failed,
            self.ledger_size,
            if self.summary_posted {
                "（日次集計投稿済み）"
            } else {
                ""
            }
        )
    }
}

impl RunReport {
    /// 空の結果を作成
    pub fn empty() -> Self {
        Self::default()
    }
}
