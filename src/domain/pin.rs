use crate::infra::api::posting::PostingGateway;
use crate::types::PinError;
use tracing::{info, warn};

/// 同時にピン留めできる投稿数
pub const MAX_PINNED: usize = 5;

/// 新しい投稿をピン留めする。上限に達していれば最古のピンを外してから行う
///
/// 失敗はログに残すのみで呼び出し元には伝えない。
pub async fn rotate_pins<G: PostingGateway + ?Sized>(
    gateway: &G,
    account_id: &str,
    new_status_id: &str,
) {
    if let Err(e) = try_rotate_pins(gateway, account_id, new_status_id).await {
        warn!(error = %e, status_id = %new_status_id, "ピン留めの更新に失敗");
    }
}

async fn try_rotate_pins<G: PostingGateway + ?Sized>(
    gateway: &G,
    account_id: &str,
    new_status_id: &str,
) -> Result<(), PinError> {
    let pinned = gateway
        .pinned_statuses(account_id)
        .await
        .map_err(PinError::List)?;

    if pinned.len() >= MAX_PINNED {
        if let Some(oldest) = pinned.iter().min_by_key(|status| status.created_at) {
            match gateway.unpin(&oldest.id).await {
                Ok(()) => info!(status_id = %oldest.id, "最も古いピン留めを解除"),
                // 解除できなくてもピン留めは試す
                Err(source) => {
                    let e = PinError::Unpin {
                        id: oldest.id.clone(),
                        source,
                    };
                    warn!(error = %e, "ピン留め解除に失敗");
                }
            }
        }
    }

    gateway
        .pin(new_status_id)
        .await
        .map_err(|source| PinError::Pin {
            id: new_status_id.to_string(),
            source,
        })?;
    info!(status_id = %new_status_id, "集計投稿をピン留め");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::api::posting::{GatewayCall, MockPostingGateway, Status};
    use chrono::{Duration, TimeZone, Utc};

    fn pinned(n: usize) -> Vec<Status> {
        let base = Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap();
        // 作成日時の古いものを配列の途中に置く
        let mut statuses: Vec<Status> = (0..n)
            .map(|i| Status {
                id: format!("p{}", i),
                created_at: base + Duration::days(i as i64),
                content: String::new(),
            })
            .collect();
        statuses.rotate_left(n / 2);
        statuses
    }

    #[tokio::test]
    async fn test_five_pins_unpins_oldest_first() {
        let gateway = MockPostingGateway::new().with_pinned(pinned(5));
        rotate_pins(&gateway, "1", "new").await;

        assert_eq!(
            gateway.calls(),
            vec![
                GatewayCall::Unpin("p0".to_string()),
                GatewayCall::Pin("new".to_string()),
            ],
            "最古の1件だけを外してからピン留めするべき"
        );
        let ids = gateway.pinned_ids();
        assert_eq!(ids.len(), MAX_PINNED);
        assert!(ids.contains(&"new".to_string()));
    }

    #[tokio::test]
    async fn test_four_pins_no_unpin() {
        let gateway = MockPostingGateway::new().with_pinned(pinned(4));
        rotate_pins(&gateway, "1", "new").await;

        assert_eq!(gateway.calls(), vec![GatewayCall::Pin("new".to_string())]);
        assert_eq!(gateway.pinned_ids().len(), 5);
    }

    #[tokio::test]
    async fn test_pin_failure_is_swallowed() {
        let gateway = MockPostingGateway::new()
            .with_pinned(pinned(5))
            .failing_pin();
        rotate_pins(&gateway, "1", "new").await;
        assert_eq!(gateway.calls().len(), 2);
    }
}
