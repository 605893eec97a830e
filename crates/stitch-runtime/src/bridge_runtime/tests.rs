use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use stitch_core::events::{ChatEvent, TrackerEvent};
use stitch_core::mirror_store::{CommentOrigin, MirrorThread};
use stitch_core::platform::{
    ChatPlatform, CreatedChatThread, CreatedIssue, ForumTag, IssueTracker, TrackerComment,
    TrackerIssue,
};
use stitch_core::transition_guard::GuardPhase;

use super::{BridgeRuntime, BridgeRuntimeConfig};

#[derive(Default)]
struct RecordingChat {
    calls: Mutex<Vec<String>>,
    thread_counter: AtomicU64,
    message_counter: AtomicU64,
    tags: Vec<ForumTag>,
}

impl RecordingChat {
    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|call| call.starts_with(method))
            .count()
    }
}

#[async_trait]
impl ChatPlatform for RecordingChat {
    async fn create_thread(
        &self,
        title: &str,
        _body: &str,
        _applied_tags: &[String],
    ) -> Result<CreatedChatThread> {
        self.record(format!("create_thread:{title}"));
        let chat_id = (9000 + self.thread_counter.fetch_add(1, Ordering::SeqCst)).to_string();
        Ok(CreatedChatThread { chat_id })
    }

    async fn create_message(&self, chat_id: &str, _body: &str) -> Result<String> {
        self.record(format!("create_message:{chat_id}"));
        Ok((7000 + self.message_counter.fetch_add(1, Ordering::SeqCst)).to_string())
    }

    async fn delete_message(&self, chat_id: &str, message_id: &str) -> Result<()> {
        self.record(format!("delete_message:{chat_id}:{message_id}"));
        Ok(())
    }

    async fn archive_thread(&self, chat_id: &str) -> Result<()> {
        self.record(format!("archive_thread:{chat_id}"));
        Ok(())
    }

    async fn unarchive_thread(&self, chat_id: &str) -> Result<()> {
        self.record(format!("unarchive_thread:{chat_id}"));
        Ok(())
    }

    async fn lock_thread(&self, chat_id: &str) -> Result<()> {
        self.record(format!("lock_thread:{chat_id}"));
        Ok(())
    }

    async fn unlock_thread(&self, chat_id: &str) -> Result<()> {
        self.record(format!("unlock_thread:{chat_id}"));
        Ok(())
    }

    async fn delete_thread(&self, chat_id: &str) -> Result<()> {
        self.record(format!("delete_thread:{chat_id}"));
        Ok(())
    }

    async fn forum_tags(&self) -> Result<Vec<ForumTag>> {
        self.record("forum_tags".to_string());
        Ok(self.tags.clone())
    }
}

#[derive(Default)]
struct RecordingTracker {
    calls: Mutex<Vec<String>>,
    issues: Mutex<Vec<TrackerIssue>>,
    comments: Mutex<Vec<TrackerComment>>,
    issue_counter: AtomicU64,
    comment_counter: AtomicU64,
    /// Artificial suspension applied to `lock_issue` before it records.
    lock_delay: Duration,
}

impl RecordingTracker {
    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|call| call.starts_with(method))
            .count()
    }

    fn seed_issue(&self, issue: TrackerIssue) {
        self.issues.lock().expect("issues lock").push(issue);
    }

    fn seed_comment(&self, comment: TrackerComment) {
        self.comments.lock().expect("comments lock").push(comment);
    }
}

#[async_trait]
impl IssueTracker for RecordingTracker {
    async fn list_issues(&self) -> Result<Vec<TrackerIssue>> {
        self.record("list_issues".to_string());
        Ok(self.issues.lock().expect("issues lock").clone())
    }

    async fn list_comments(&self) -> Result<Vec<TrackerComment>> {
        self.record("list_comments".to_string());
        Ok(self.comments.lock().expect("comments lock").clone())
    }

    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        _labels: &[String],
    ) -> Result<CreatedIssue> {
        self.record(format!("create_issue:{title}"));
        let number = 1 + self.issue_counter.fetch_add(1, Ordering::SeqCst);
        Ok(CreatedIssue {
            number,
            node_id: format!("NODE_{number}"),
            body: body.to_string(),
        })
    }

    async fn create_comment(&self, issue_number: u64, _body: &str) -> Result<u64> {
        self.record(format!("create_comment:{issue_number}"));
        Ok(100 + self.comment_counter.fetch_add(1, Ordering::SeqCst))
    }

    async fn delete_comment(&self, comment_id: u64) -> Result<()> {
        self.record(format!("delete_comment:{comment_id}"));
        Ok(())
    }

    async fn delete_issue(&self, node_id: &str) -> Result<()> {
        self.record(format!("delete_issue:{node_id}"));
        Ok(())
    }

    async fn set_issue_state(&self, issue_number: u64, open: bool) -> Result<()> {
        self.record(format!("set_issue_state:{issue_number}:{open}"));
        Ok(())
    }

    async fn lock_issue(&self, issue_number: u64) -> Result<()> {
        if !self.lock_delay.is_zero() {
            tokio::time::sleep(self.lock_delay).await;
        }
        self.record(format!("lock_issue:{issue_number}"));
        Ok(())
    }

    async fn unlock_issue(&self, issue_number: u64) -> Result<()> {
        self.record(format!("unlock_issue:{issue_number}"));
        Ok(())
    }

    async fn assign_issue(&self, issue_number: u64, assignee: &str) -> Result<()> {
        self.record(format!("assign_issue:{issue_number}:{assignee}"));
        Ok(())
    }

    async fn list_collaborators(&self) -> Result<Vec<String>> {
        self.record("list_collaborators".to_string());
        Ok(vec!["octocat".to_string()])
    }
}

const FORUM: &str = "500";

fn build_runtime(
    chat: Arc<RecordingChat>,
    tracker: Arc<RecordingTracker>,
) -> Arc<BridgeRuntime> {
    let config = BridgeRuntimeConfig {
        forum_channel_id: FORUM.to_string(),
        guild_id: 1,
        repo_slug: "acme/widgets".to_string(),
        archive_debounce: Duration::from_millis(20),
        assignment_ttl: Duration::from_secs(60),
    };
    Arc::new(BridgeRuntime::new(config, chat, tracker))
}

fn thread_created(chat_id: &str, title: &str) -> ChatEvent {
    ChatEvent::ThreadCreated {
        chat_id: chat_id.to_string(),
        parent_id: FORUM.to_string(),
        title: title.to_string(),
        applied_tags: Vec::new(),
    }
}

fn message_created(chat_id: &str, message_id: &str, content: &str) -> ChatEvent {
    ChatEvent::MessageCreated {
        chat_id: chat_id.to_string(),
        message_id: message_id.to_string(),
        guild_id: 1,
        author_login: "alice".to_string(),
        author_avatar: Some("https://cdn.example/alice.webp".to_string()),
        author_is_bot: false,
        content: content.to_string(),
        attachments: Vec::new(),
    }
}

fn thread_updated(chat_id: &str, locked: bool, archived: bool) -> ChatEvent {
    ChatEvent::ThreadUpdated {
        chat_id: chat_id.to_string(),
        parent_id: FORUM.to_string(),
        locked,
        archived,
    }
}

fn seeded_thread(chat_id: &str, number: u64, node_id: &str) -> MirrorThread {
    let mut thread = MirrorThread::new(chat_id, "seeded");
    thread.issue_number = Some(number);
    thread.issue_node_id = Some(node_id.to_string());
    thread.body = Some("body".to_string());
    thread
}

#[tokio::test]
async fn functional_starter_message_opens_issue_and_announces() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat.clone(), tracker.clone());

    runtime.handle_chat_event(thread_created("600", "hello")).await;
    runtime
        .handle_chat_event(message_created("600", "601", "hello world"))
        .await;

    assert_eq!(tracker.count("create_issue"), 1);
    let thread = runtime.store().get("600").expect("thread");
    assert_eq!(thread.issue_number, Some(1));
    assert_eq!(thread.issue_node_id.as_deref(), Some("NODE_1"));
    let body = thread.body.expect("issue body");
    assert!(body.contains("https://discord.com/channels/1/600/601"));
    // The announcement posts back into the thread.
    assert_eq!(chat.count("create_message:600"), 1);
}

#[tokio::test]
async fn functional_followup_message_mirrors_as_comment() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat.clone(), tracker.clone());

    runtime.handle_chat_event(thread_created("600", "hello")).await;
    runtime
        .handle_chat_event(message_created("600", "601", "hello"))
        .await;
    runtime
        .handle_chat_event(message_created("600", "602", "world"))
        .await;

    assert_eq!(tracker.count("create_comment:1"), 1);
    let thread = runtime.store().get("600").expect("thread");
    assert!(thread.comment_by_chat_message("602").is_some());
}

#[tokio::test]
async fn regression_duplicate_message_is_mirrored_once() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat, tracker.clone());

    runtime.handle_chat_event(thread_created("600", "hello")).await;
    runtime
        .handle_chat_event(message_created("600", "601", "hello"))
        .await;
    runtime
        .handle_chat_event(message_created("600", "602", "world"))
        .await;
    runtime
        .handle_chat_event(message_created("600", "602", "world"))
        .await;

    assert_eq!(tracker.count("create_comment"), 1);
}

#[tokio::test]
async fn unit_bot_messages_are_ignored() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat, tracker.clone());

    runtime.handle_chat_event(thread_created("600", "hello")).await;
    let event = ChatEvent::MessageCreated {
        chat_id: "600".to_string(),
        message_id: "601".to_string(),
        guild_id: 1,
        author_login: "stitch".to_string(),
        author_avatar: None,
        author_is_bot: true,
        content: "announcement".to_string(),
        attachments: Vec::new(),
    };
    runtime.handle_chat_event(event).await;

    assert_eq!(tracker.count("create_issue"), 0);
    assert_eq!(tracker.count("create_comment"), 0);
}

#[tokio::test]
async fn unit_events_outside_monitored_forum_are_ignored() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat, tracker.clone());

    let event = ChatEvent::ThreadCreated {
        chat_id: "600".to_string(),
        parent_id: "999".to_string(),
        title: "elsewhere".to_string(),
        applied_tags: Vec::new(),
    };
    runtime.handle_chat_event(event).await;

    assert!(runtime.store().is_empty());
}

#[tokio::test]
async fn regression_comment_without_issue_number_makes_no_tracker_calls() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat, tracker.clone());

    // An entry that claims an issue body but lost its number.
    let mut thread = MirrorThread::new("600", "hello");
    thread.body = Some("body".to_string());
    runtime.store().upsert(thread);

    runtime
        .handle_chat_event(message_created("600", "601", "orphan"))
        .await;

    assert_eq!(tracker.count("create_comment"), 0);
    assert_eq!(tracker.count("create_issue"), 0);
}

#[tokio::test]
async fn functional_message_delete_retracts_mirrored_comment() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat, tracker.clone());

    runtime.handle_chat_event(thread_created("600", "hello")).await;
    runtime
        .handle_chat_event(message_created("600", "601", "hello"))
        .await;
    runtime
        .handle_chat_event(message_created("600", "602", "world"))
        .await;

    runtime
        .handle_chat_event(ChatEvent::MessageDeleted {
            chat_id: "600".to_string(),
            message_id: "602".to_string(),
        })
        .await;

    assert_eq!(tracker.count("delete_comment:100"), 1);
    let thread = runtime.store().get("600").expect("thread");
    assert!(thread.comment_by_chat_message("602").is_none());
}

#[tokio::test]
async fn regression_double_lock_signal_calls_tracker_once() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat, tracker.clone());
    runtime.store().upsert(seeded_thread("600", 5, "NODE_5"));

    runtime.handle_chat_event(thread_updated("600", true, false)).await;
    runtime.handle_chat_event(thread_updated("600", true, false)).await;

    assert_eq!(tracker.count("lock_issue:5"), 1);
    assert!(runtime.store().get("600").expect("thread").locked);
}

#[tokio::test]
async fn integration_tracker_lock_echo_is_absorbed() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat.clone(), tracker.clone());
    runtime.store().upsert(seeded_thread("600", 5, "NODE_5"));

    runtime
        .handle_tracker_event(TrackerEvent::IssueLocked {
            node_id: "NODE_5".to_string(),
        })
        .await;
    assert_eq!(chat.count("lock_thread:600"), 1);
    assert_eq!(
        runtime.store().get("600").expect("thread").guard,
        GuardPhase::LockPending
    );

    // Discord echoes the flip back through the gateway.
    runtime.handle_chat_event(thread_updated("600", true, false)).await;

    assert_eq!(tracker.count("lock_issue"), 0);
    let thread = runtime.store().get("600").expect("thread");
    assert_eq!(thread.guard, GuardPhase::Settled);
    assert!(thread.locked);
}

#[tokio::test]
async fn functional_archive_change_propagates_after_debounce() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat, tracker.clone());
    runtime.store().upsert(seeded_thread("600", 6, "NODE_6"));

    runtime.handle_chat_event(thread_updated("600", false, true)).await;
    assert_eq!(tracker.count("set_issue_state"), 0);

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(tracker.count("set_issue_state:6:false"), 1);
    assert!(runtime.store().get("600").expect("thread").archived);
}

#[tokio::test]
async fn regression_unlock_then_unarchive_burst_is_absorbed() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat, tracker.clone());
    let mut thread = seeded_thread("600", 7, "NODE_7");
    thread.locked = true;
    thread.archived = true;
    runtime.store().upsert(thread);

    // Unlocking an archived thread makes Discord report both flags flipped
    // in one update; only the lock change is genuine.
    runtime.handle_chat_event(thread_updated("600", false, false)).await;
    assert_eq!(tracker.count("unlock_issue:7"), 1);

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(tracker.count("set_issue_state"), 0);
    let thread = runtime.store().get("600").expect("thread");
    assert_eq!(thread.guard, GuardPhase::Settled);
    assert!(thread.archived);
}

#[tokio::test]
async fn regression_suspended_tracker_call_does_not_stall_event_loop() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker {
        lock_delay: Duration::from_millis(300),
        ..RecordingTracker::default()
    });
    let runtime = build_runtime(chat, tracker.clone());
    runtime.store().upsert(seeded_thread("600", 5, "NODE_5"));
    runtime.store().upsert(seeded_thread("700", 6, "NODE_6"));

    let (events_tx, events_rx) = tokio::sync::mpsc::channel(8);
    tokio::spawn(Arc::clone(&runtime).run_chat_event_loop(events_rx));

    // The lock propagation for "600" suspends inside the tracker; the
    // comment for "700" must not queue behind it.
    events_tx
        .send(thread_updated("600", true, false))
        .await
        .expect("send");
    events_tx
        .send(message_created("700", "701", "independent"))
        .await
        .expect("send");

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(tracker.count("create_comment:6"), 1);
    assert_eq!(tracker.count("lock_issue"), 0);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(tracker.count("lock_issue:5"), 1);
    assert!(runtime.store().get("600").expect("thread").locked);
}

#[tokio::test]
async fn regression_thread_delete_leaves_pending_debounce_inert() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat, tracker.clone());
    runtime.store().upsert(seeded_thread("600", 6, "NODE_6"));

    runtime.handle_chat_event(thread_updated("600", false, true)).await;
    runtime
        .handle_chat_event(ChatEvent::ThreadDeleted {
            chat_id: "600".to_string(),
            parent_id: FORUM.to_string(),
        })
        .await;

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(tracker.count("set_issue_state"), 0);
    assert_eq!(tracker.count("delete_issue:NODE_6"), 1);
    assert!(runtime.store().is_empty());
}

#[tokio::test]
async fn integration_thread_delete_cascades_to_tracker() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat, tracker.clone());
    runtime.store().upsert(seeded_thread("600", 8, "NODE_8"));

    runtime
        .handle_chat_event(ChatEvent::ThreadDeleted {
            chat_id: "600".to_string(),
            parent_id: FORUM.to_string(),
        })
        .await;

    assert_eq!(tracker.count("delete_issue:NODE_8"), 1);
    assert!(runtime.store().is_empty());
}

#[tokio::test]
async fn integration_issue_delete_cascades_to_chat() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat.clone(), tracker);
    runtime.store().upsert(seeded_thread("600", 8, "NODE_8"));

    runtime
        .handle_tracker_event(TrackerEvent::IssueDeleted {
            node_id: "NODE_8".to_string(),
        })
        .await;

    assert_eq!(chat.count("delete_thread:600"), 1);
    assert!(runtime.store().is_empty());
}

#[tokio::test]
async fn functional_opened_issue_without_fragment_creates_thread() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat.clone(), tracker);

    runtime
        .handle_tracker_event(TrackerEvent::IssueOpened {
            number: 10,
            node_id: "NODE_10".to_string(),
            title: "broken widget".to_string(),
            body: "it broke".to_string(),
            author_login: "bob".to_string(),
            labels: Vec::new(),
        })
        .await;

    assert_eq!(chat.count("create_thread:broken widget"), 1);
    let thread = runtime.store().find_by_issue_node("NODE_10").expect("thread");
    assert_eq!(thread.issue_number, Some(10));
}

#[tokio::test]
async fn regression_opened_issue_with_fragment_registers_without_creating() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat.clone(), tracker);

    runtime
        .handle_tracker_event(TrackerEvent::IssueOpened {
            number: 11,
            node_id: "NODE_11".to_string(),
            title: "from chat".to_string(),
            body: "[alice](https://discord.com/channels/1/777/778)  `BOT`\n\nhello".to_string(),
            author_login: "stitch".to_string(),
            labels: Vec::new(),
        })
        .await;

    assert_eq!(chat.count("create_thread"), 0);
    let thread = runtime.store().get("777").expect("thread");
    assert_eq!(thread.issue_number, Some(11));
}

#[tokio::test]
async fn functional_tracker_comment_mirrors_into_chat() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat.clone(), tracker);
    runtime.store().upsert(seeded_thread("600", 12, "NODE_12"));

    runtime
        .handle_tracker_event(TrackerEvent::CommentCreated {
            node_id: "NODE_12".to_string(),
            comment_id: 300,
            body: "me too".to_string(),
            author_login: "bob".to_string(),
        })
        .await;

    assert_eq!(chat.count("create_message:600"), 1);
    let thread = runtime.store().get("600").expect("thread");
    assert!(thread.has_tracker_comment(300));
    assert_eq!(
        thread.comments[0].origin,
        CommentOrigin::TrackerOriginated
    );
}

#[tokio::test]
async fn regression_fragment_bearing_comment_echo_is_discarded() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat.clone(), tracker);
    runtime.store().upsert(seeded_thread("600", 12, "NODE_12"));

    runtime
        .handle_tracker_event(TrackerEvent::CommentCreated {
            node_id: "NODE_12".to_string(),
            comment_id: 301,
            body: "[alice](https://discord.com/channels/1/600/601)  `BOT`\n\nhello".to_string(),
            author_login: "stitch".to_string(),
        })
        .await;

    assert_eq!(chat.count("create_message"), 0);
    assert!(!runtime.store().get("600").expect("thread").has_tracker_comment(301));
}

#[tokio::test]
async fn integration_reconcile_rebuilds_registry_idempotently() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    tracker.seed_issue(TrackerIssue {
        number: 20,
        node_id: "NODE_20".to_string(),
        title: "from chat".to_string(),
        body: Some("[alice](https://discord.com/channels/1/888/889)  `BOT`\n\nhi".to_string()),
        labels: Vec::new(),
        locked: false,
        closed: false,
    });
    tracker.seed_issue(TrackerIssue {
        number: 21,
        node_id: "NODE_21".to_string(),
        title: "tracker native".to_string(),
        body: Some("needs a thread".to_string()),
        labels: Vec::new(),
        locked: false,
        closed: false,
    });
    tracker.seed_comment(TrackerComment {
        id: 400,
        issue_number: 20,
        body: Some("[alice](https://discord.com/channels/1/888/890)  `BOT`\n\nfollow-up".to_string()),
        author_login: "stitch".to_string(),
    });
    tracker.seed_comment(TrackerComment {
        id: 401,
        issue_number: 20,
        body: Some("tracker reply".to_string()),
        author_login: "bob".to_string(),
    });

    let runtime = build_runtime(chat.clone(), tracker.clone());
    let registered = runtime.reconcile().await.expect("reconcile");
    assert_eq!(registered, 2);
    assert_eq!(chat.count("create_thread"), 1);
    assert_eq!(chat.count("create_message:888"), 1);

    let thread = runtime.store().get("888").expect("thread");
    assert!(thread.comment_by_chat_message("890").is_some());
    assert!(thread.has_tracker_comment(401));

    // A second pass finds everything already mirrored.
    let registered = runtime.reconcile().await.expect("reconcile");
    assert_eq!(registered, 0);
    assert_eq!(chat.count("create_thread"), 1);
    assert_eq!(chat.count("create_message"), 1);
}

#[tokio::test]
async fn functional_assignment_selection_then_confirmation_assigns() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat, tracker.clone());

    runtime.handle_chat_event(thread_created("600", "hello")).await;
    runtime
        .handle_chat_event(message_created("600", "601", "hello"))
        .await;

    runtime
        .handle_chat_event(ChatEvent::AssigneeSelected {
            user_id: "u1".to_string(),
            assignee: "octocat".to_string(),
        })
        .await;
    runtime
        .handle_chat_event(ChatEvent::AssignmentConfirmed {
            user_id: "u1".to_string(),
        })
        .await;

    assert_eq!(tracker.count("assign_issue:1:octocat"), 1);
}

#[tokio::test]
async fn integration_webhook_server_validates_secret_and_payload() {
    let chat = Arc::new(RecordingChat::default());
    let tracker = Arc::new(RecordingTracker::default());
    let runtime = build_runtime(chat, tracker);
    let app = super::build_webhook_router(runtime, Some("s3cret".to_string()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    let response = client
        .get(format!("{base}/healthz"))
        .send()
        .await
        .expect("healthz");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let response = client
        .post(format!("{base}/webhooks/github"))
        .header("x-stitch-webhook-secret", "wrong")
        .body("{}")
        .send()
        .await
        .expect("post");
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

    let response = client
        .post(format!("{base}/webhooks/github"))
        .header("x-stitch-webhook-secret", "s3cret")
        .body("not json")
        .send()
        .await
        .expect("post");
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let payload = serde_json::json!({
        "action": "opened",
        "issue": {
            "number": 30,
            "node_id": "NODE_30",
            "title": "via webhook",
            "body": "hello",
            "user": {"login": "bob"},
            "labels": []
        }
    });
    let response = client
        .post(format!("{base}/webhooks/github"))
        .header("x-stitch-webhook-secret", "s3cret")
        .body(payload.to_string())
        .send()
        .await
        .expect("post");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
}
