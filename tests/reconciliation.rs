mod common;

use common::{Reply, ScriptedClient};
use deckgen::generation::{GenerationRequest, GenerationService, Reconciled};
use deckgen::slide::{AssetOrigin, SlideRecord};
use deckgen::tracker::{TaskKind, TaskStatus};
use deckgen::{OrchestrationConfig, SlideStore};
use std::sync::Arc;
use std::time::Duration;

fn service_with(client: Arc<ScriptedClient>) -> GenerationService {
    GenerationService::new(SlideStore::new(), client, &OrchestrationConfig::default())
}

#[tokio::test(start_paused = true)]
async fn result_for_slide_deleted_in_flight_is_discarded() {
    let client = Arc::new(ScriptedClient::new().on_any(1_000, Reply::Text("generated".into())));
    let service = service_with(client);
    let store = service.store().clone();
    let doomed = store.push(SlideRecord::new("").with_prompt("doomed"));
    let kept = store.push(SlideRecord::new("kept"));

    let (result, _) = tokio::join!(service.run(doomed, GenerationRequest::Text), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        store.remove(&doomed);
    });

    assert_eq!(result, Ok(Reconciled::Discarded));
    assert_eq!(store.ids(), vec![kept]);
    assert_eq!(store.get(&kept).unwrap().content, "kept");
    assert_eq!(
        service.tracker().status(&doomed, TaskKind::Content),
        TaskStatus::Succeeded
    );
}

#[tokio::test(start_paused = true)]
async fn later_completion_wins_even_when_started_first() {
    let client = Arc::new(
        ScriptedClient::new()
            .once(500, Reply::Text("slow first request".into()))
            .once(100, Reply::Text("fast second request".into())),
    );
    let service = service_with(client);
    let id = service.store().push(SlideRecord::new("").with_prompt("topic"));

    let (first, second) = tokio::join!(service.run(id, GenerationRequest::Text), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        service.run(id, GenerationRequest::Text).await
    });

    assert_eq!(first, Ok(Reconciled::Applied));
    assert_eq!(second, Ok(Reconciled::Applied));
    assert_eq!(service.store().get(&id).unwrap().content, "slow first request");
}

#[tokio::test(start_paused = true)]
async fn completions_in_start_order_leave_the_second_result() {
    let client = Arc::new(
        ScriptedClient::new()
            .once(200, Reply::Text("A".into()))
            .once(500, Reply::Text("B".into())),
    );
    let service = service_with(client);
    let id = service.store().push(SlideRecord::new("").with_prompt("topic"));

    let _ = tokio::join!(service.run(id, GenerationRequest::Text), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        service.run(id, GenerationRequest::Text).await
    });

    assert_eq!(service.store().get(&id).unwrap().content, "B");
}

#[tokio::test(start_paused = true)]
async fn user_edits_made_during_generation_survive_the_write_back() {
    let client = Arc::new(ScriptedClient::new().on_any(1_000, Reply::Image(vec![7, 7, 7])));
    let service = service_with(client);
    let store = service.store().clone();
    let a = store.push(SlideRecord::new("a"));
    let b = store.push(SlideRecord::new("b").with_prompt("a red kite"));
    let c = store.push(SlideRecord::new("c"));

    let (result, _) = tokio::join!(service.run(b, GenerationRequest::Image), async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        store.move_to(&c, 0).unwrap();
        store
            .replace(&a, |s| SlideRecord {
                content: "a, edited".into(),
                ..s.clone()
            })
            .unwrap();
        store
            .replace(&b, |s| SlideRecord {
                content: "b, edited while generating".into(),
                ..s.clone()
            })
            .unwrap();
    });

    assert_eq!(result, Ok(Reconciled::Applied));
    assert_eq!(store.ids(), vec![c, a, b]);
    assert_eq!(store.get(&a).unwrap().content, "a, edited");
    let b = store.get(&b).unwrap();
    assert_eq!(b.content, "b, edited while generating");
    let asset = b.visual_asset.unwrap();
    assert_eq!(asset.data, vec![7, 7, 7]);
    assert!(matches!(asset.origin, AssetOrigin::Generated { .. }));
}

#[tokio::test(start_paused = true)]
async fn replaced_client_serves_later_calls_only() {
    let old = Arc::new(ScriptedClient::new().on_any(1_000, Reply::Text("from old client".into())));
    let new = Arc::new(ScriptedClient::new().on_any(10, Reply::Text("from new client".into())));
    let service = service_with(old.clone());
    let first = service.store().push(SlideRecord::new("").with_prompt("one"));
    let second = service.store().push(SlideRecord::new("").with_prompt("two"));

    let (r1, r2) = tokio::join!(service.run(first, GenerationRequest::Text), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        service.reconfigure_client(new.clone());
        service.run(second, GenerationRequest::Text).await
    });

    assert!(r1.is_ok() && r2.is_ok());
    assert_eq!(service.store().get(&first).unwrap().content, "from old client");
    assert_eq!(service.store().get(&second).unwrap().content, "from new client");
    assert_eq!(old.call_count(), 1);
    assert_eq!(new.call_count(), 1);
}
