use crate::session::shutdown::{DrainMode, DrainPolicy, ShutdownCoordinator};
use crate::session::{LifecycleState, ServerSession};

use std::future::pending;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::{sleep as TokioSleep, timeout};

fn policy(mode: DrainMode) -> DrainPolicy {
    DrainPolicy {
        ack_delay: Duration::from_millis(50),
        grace_period: Duration::from_millis(50),
        mode,
    }
}

fn coordinator(mode: DrainMode) -> ShutdownCoordinator {
    ShutdownCoordinator::new(Arc::new(ServerSession::new(4000, None)), policy(mode))
}

#[test]
fn given_new_session_when_created_then_listening() {
    let session = ServerSession::new(4000, None);

    assert_eq!(session.state(), LifecycleState::Listening);
    assert_eq!(session.port(), 4000);
    assert!(session.instance_id().is_none());
}

/// **VALUE**: Only the first termination request starts a drain.
///
/// **BUG THIS CATCHES**: Would catch a second `/shutdown` restarting the
/// acknowledgement timer or moving a terminated session back to draining.
#[test]
fn given_draining_session_when_draining_again_then_no_transition() {
    // GIVEN
    let session = ServerSession::new(4000, None);
    assert!(session.begin_draining());

    // WHEN
    let again = session.begin_draining();

    // THEN
    assert!(!again);
    assert_eq!(session.state(), LifecycleState::Draining);

    session.mark_terminated();
    assert!(!session.begin_draining());
    assert_eq!(session.state(), LifecycleState::Terminated);
}

#[tokio::test]
async fn given_subscriber_when_session_drains_then_sees_transition() {
    // GIVEN
    let session = ServerSession::new(4000, None);
    let mut states = session.subscribe();

    // WHEN
    session.begin_draining();

    // THEN
    states.changed().await.expect("sender alive");
    assert_eq!(*states.borrow(), LifecycleState::Draining);
}

/// **VALUE**: The drain starts only after the acknowledgement delay.
///
/// **WHY THIS MATTERS**: The `/shutdown` handler must be able to deliver its
/// response before the listener goes away.
#[tokio::test]
async fn given_request_when_within_ack_delay_then_drain_not_started() {
    // GIVEN
    let coordinator = coordinator(DrainMode::Force);
    let drain = coordinator.drain_signal();

    // WHEN
    assert!(coordinator.request());

    // THEN: Draining state immediately, drain signal only after the delay
    assert_eq!(coordinator.session().state(), LifecycleState::Draining);
    tokio::pin!(drain);
    assert!(
        timeout(Duration::from_millis(10), &mut drain).await.is_err(),
        "drain must wait for the acknowledgement delay"
    );
    timeout(Duration::from_secs(2), drain)
        .await
        .expect("drain should start after the delay");
}

#[tokio::test]
async fn given_second_request_when_already_draining_then_returns_false() {
    let coordinator = coordinator(DrainMode::Force);

    assert!(coordinator.request());
    assert!(!coordinator.request());
    assert!(!coordinator.request_now());
}

#[tokio::test]
async fn given_cooperative_mode_when_drain_started_then_grace_never_expires() {
    // GIVEN
    let coordinator = coordinator(DrainMode::Cooperative);
    coordinator.request_now();

    // WHEN / THEN
    let expired = timeout(Duration::from_millis(300), coordinator.grace_expired()).await;
    assert!(expired.is_err(), "cooperative drain has no deadline");
}

/// **VALUE**: In force mode a stuck request cannot keep the process alive.
///
/// **BUG THIS CATCHES**: Would catch the coordinator waiting on the serve
/// future forever when a client never finishes its request.
#[tokio::test]
async fn given_force_mode_and_stuck_serve_when_grace_expires_then_terminated_and_hook_runs() {
    // GIVEN: A serve future that never completes
    let coordinator = coordinator(DrainMode::Force);
    let hook_ran = Arc::new(AtomicBool::new(false));
    let hook_flag = Arc::clone(&hook_ran);
    let stuck = pending::<Result<(), std::io::Error>>();

    // WHEN
    coordinator.request_now();
    timeout(
        Duration::from_secs(2),
        coordinator.run_until_terminated(
            stuck,
            Some(Box::new(move |session: &ServerSession| {
                assert_eq!(session.state(), LifecycleState::Terminated);
                hook_flag.store(true, Ordering::SeqCst);
            })),
        ),
    )
    .await
    .expect("force drain should finish");

    // THEN
    assert_eq!(coordinator.session().state(), LifecycleState::Terminated);
    assert!(hook_ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn given_cooperative_mode_when_serve_finishes_late_then_waits_for_it() {
    // GIVEN: A serve future that takes longer than the grace period
    let coordinator = coordinator(DrainMode::Cooperative);
    let drained = Arc::new(AtomicBool::new(false));
    let drained_flag = Arc::clone(&drained);
    let drain = coordinator.drain_signal();
    let slow = async move {
        drain.await;
        TokioSleep(Duration::from_millis(200)).await;
        drained_flag.store(true, Ordering::SeqCst);
        Ok::<(), std::io::Error>(())
    };

    // WHEN
    coordinator.request_now();
    coordinator.run_until_terminated(slow, None).await;

    // THEN
    assert!(drained.load(Ordering::SeqCst));
    assert_eq!(coordinator.session().state(), LifecycleState::Terminated);
}

#[tokio::test]
async fn given_serve_error_when_draining_then_still_terminated() {
    let coordinator = coordinator(DrainMode::Force);
    let failing = async { Err::<(), _>(std::io::Error::other("accept failed")) };

    coordinator.run_until_terminated(failing, None).await;

    assert_eq!(coordinator.session().state(), LifecycleState::Terminated);
}
