mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use common::session;
use ratatui::layout::Rect;
use term_desk::{Session, Window};

fn pump_until(desk: &mut Session, deadline: Duration, mut done: impl FnMut(&Session) -> bool) {
    let start = Instant::now();
    while !done(desk) {
        assert!(start.elapsed() < deadline, "timed out waiting on the session");
        desk.apply_pending_requests();
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn delayed_task_runs_once_and_cancelled_one_never_does() {
    let mut desk = session(40, 12);
    let ran = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&ran);
    let fired = desk.after(Duration::from_millis(2), move |_: &mut Session| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = Arc::clone(&ran);
    let cancelled = desk.after(Duration::from_secs(60), move |_: &mut Session| {
        counter.fetch_add(100, Ordering::SeqCst);
    });
    cancelled.cancel();
    assert!(cancelled.is_cancelled());

    fired.join();
    cancelled.join();
    desk.apply_pending_requests();
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[test]
fn repeating_task_stops_cleanly_on_cancel() {
    let mut desk = session(40, 12);
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);
    let task = desk.every(Duration::from_millis(1), move |_: &mut Session| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    pump_until(&mut desk, Duration::from_secs(5), |_| {
        ticks.load(Ordering::SeqCst) >= 3
    });
    task.cancel();
    let seen = ticks.load(Ordering::SeqCst);
    task.join();
    // Anything already queued carries the cancelled token and is dropped.
    desk.apply_pending_requests();
    assert_eq!(ticks.load(Ordering::SeqCst), seen);
}

#[test]
fn worker_thread_opens_a_modal_and_waits_for_it() {
    let mut desk = session(60, 20);
    desk.add_window(Window::new("main", Rect::new(0, 0, 60, 20)));
    let handle = desk.handle();

    let worker = thread::spawn(move || {
        let waiter = handle.open_modal(|| Window::new("Proceed?", Rect::new(10, 5, 30, 8)));
        waiter.wait()
    });

    pump_until(&mut desk, Duration::from_secs(5), |desk| desk.is_ui_blocked());
    let dialog = desk.windows().top_modal().unwrap();
    assert_eq!(desk.focus().window(), Some(dialog));
    desk.remove_window(dialog);

    let closed = worker.join().unwrap().unwrap();
    assert_eq!(closed.id, dialog);
    assert_eq!(closed.title, "Proceed?");
    assert!(!desk.is_ui_blocked());
}

#[test]
fn handles_outliving_the_session_report_failure() {
    let desk = session(10, 5);
    let handle = desk.handle();
    drop(desk);
    assert!(!handle.quit());
    assert!(!handle.apply(|_| {}));
}
