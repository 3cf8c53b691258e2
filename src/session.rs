//! The session: single owner of all UI state.
//!
//! One thread (the one calling [`Session::run`] or [`Session::tick`]) owns the
//! window manager, the control trees, the dirty tracker and the focus
//! state. Everybody else talks to it by posting [`MutationRequest`]s through
//! a cloneable [`SessionHandle`]; queued requests are applied at the start of
//! each cycle, before input routing and rendering, so their effects show up
//! in the same frame.

use std::cell::Cell as StdCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::{Duration, Instant};

use crossterm::event::Event;
use ratatui::layout::Size;

use crate::compositor::{Compositor, FrameReport};
use crate::config::DeskConfig;
use crate::control::ControlId;
use crate::drivers::{InputDriver, OutputDriver};
use crate::error::{DeskError, DeskResult};
use crate::event_loop::{ControlFlow, EventLoop};
use crate::focus::{FocusChange, FocusState};
use crate::input::{InputRouter, KeyCombo, RouteOutcome, ShortcutContext, ShortcutId};
use crate::observer::SubscriptionId;
use crate::scheduler::{CancelToken, Scheduler, TaskHandle};
use crate::window::{CloseOutcome, Window, WindowClosed, WindowId, WindowManager};

/// Counts open modal windows. Shared with every [`SessionHandle`] so other
/// threads can see when the UI is blocked.
#[derive(Debug, Clone, Default)]
pub struct UiBlocked(Arc<AtomicUsize>);

impl UiBlocked {
    /// Hold the UI blocked until the guard drops.
    pub fn enter(&self) -> UiBlockedGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        UiBlockedGuard(Arc::clone(&self.0))
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_blocked(&self) -> bool {
        self.count() > 0
    }
}

#[derive(Debug)]
pub struct UiBlockedGuard(Arc<AtomicUsize>);

impl Drop for UiBlockedGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Work posted to the session from outside its thread.
pub enum MutationRequest {
    Apply(Box<dyn FnOnce(&mut Session) + Send>),
    /// Routed like terminal input, unless a modal window is open.
    Input(Event),
    CloseWindow(WindowId),
    /// Dropped unapplied if `token` is cancelled by the time it is reached.
    Cancellable {
        token: CancelToken,
        request: Box<MutationRequest>,
    },
    Quit,
}

impl fmt::Debug for MutationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationRequest::Apply(_) => f.write_str("Apply(..)"),
            MutationRequest::Input(event) => f.debug_tuple("Input").field(event).finish(),
            MutationRequest::CloseWindow(id) => f.debug_tuple("CloseWindow").field(id).finish(),
            MutationRequest::Cancellable { token, request } => f
                .debug_struct("Cancellable")
                .field("cancelled", &token.is_cancelled())
                .field("request", request)
                .finish(),
            MutationRequest::Quit => f.write_str("Quit"),
        }
    }
}

/// `Send` + `Clone` way into a session from other threads.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: Sender<MutationRequest>,
    ui_blocked: UiBlocked,
}

impl SessionHandle {
    /// Queue a request. Returns `false` once the session is gone.
    pub fn post(&self, request: MutationRequest) -> bool {
        self.tx.send(request).is_ok()
    }

    pub fn apply(&self, f: impl FnOnce(&mut Session) + Send + 'static) -> bool {
        self.post(MutationRequest::Apply(Box::new(f)))
    }

    pub fn post_input(&self, event: Event) -> bool {
        self.post(MutationRequest::Input(event))
    }

    pub fn close_window(&self, id: WindowId) -> bool {
        self.post(MutationRequest::CloseWindow(id))
    }

    pub fn quit(&self) -> bool {
        self.post(MutationRequest::Quit)
    }

    pub fn is_ui_blocked(&self) -> bool {
        self.ui_blocked.is_blocked()
    }

    /// Open the window built by `build` as a modal dialog and return a
    /// waiter that resolves when it closes.
    pub fn open_modal<F>(&self, build: F) -> ModalWaiter
    where
        F: FnOnce() -> Window + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.apply(move |session| {
            let window = build();
            let window = if window.is_modal() { window } else { window.modal() };
            let id = session.add_window(window);
            let observers = session.windows.closed_observers();
            let list = observers.clone();
            let own_id: Rc<StdCell<Option<SubscriptionId>>> = Rc::new(StdCell::new(None));
            let slot = Rc::clone(&own_id);
            let subscription = observers.subscribe(move |closed: &WindowClosed| {
                if closed.id != id {
                    return;
                }
                let _ = tx.send(closed.clone());
                if let Some(sub) = slot.take() {
                    list.unsubscribe(sub);
                }
            });
            own_id.set(Some(subscription));
        });
        ModalWaiter { rx }
    }
}

/// Resolves when a modal window opened through
/// [`SessionHandle::open_modal`] closes. Every method returns `None` if the
/// session went away first.
#[derive(Debug)]
pub struct ModalWaiter {
    rx: Receiver<WindowClosed>,
}

impl ModalWaiter {
    pub fn wait(self) -> Option<WindowClosed> {
        self.rx.recv().ok()
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<WindowClosed> {
        match self.rx.recv_timeout(timeout) {
            Ok(closed) => Some(closed),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_wait(&self) -> Option<WindowClosed> {
        match self.rx.try_recv() {
            Ok(closed) => Some(closed),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

pub struct Session {
    config: DeskConfig,
    windows: WindowManager,
    router: InputRouter,
    compositor: Compositor,
    requests: Receiver<MutationRequest>,
    handle: SessionHandle,
    driver_failures: u32,
    quit: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("desktop", &self.windows.desktop_size())
            .field("windows", &self.windows.len())
            .field("focus", &self.router.focus())
            .field("driver_failures", &self.driver_failures)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(config: DeskConfig, desktop: Size) -> DeskResult<Self> {
        config.validate()?;
        let windows = WindowManager::new(desktop, &config);
        let (tx, requests) = mpsc::channel();
        let handle = SessionHandle {
            tx,
            ui_blocked: windows.ui_blocked().clone(),
        };
        Ok(Self {
            router: InputRouter::new(&config),
            compositor: Compositor::new(desktop, &config),
            windows,
            requests,
            handle,
            driver_failures: 0,
            quit: false,
            config,
        })
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.handle())
    }

    pub fn windows(&self) -> &WindowManager {
        &self.windows
    }

    /// Direct access to the window manager. Focus catches up with any
    /// change on the next cycle or the next session call.
    pub fn windows_mut(&mut self) -> &mut WindowManager {
        &mut self.windows
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut Compositor {
        &mut self.compositor
    }

    pub fn desktop_size(&self) -> Size {
        self.windows.desktop_size()
    }

    pub fn focus(&self) -> Arc<FocusState> {
        self.router.focus()
    }

    pub fn is_ui_blocked(&self) -> bool {
        self.windows.ui_blocked().is_blocked()
    }

    fn sync_focus(&mut self) {
        self.router.sync(&mut self.windows, Instant::now());
    }

    pub fn add_window(&mut self, window: Window) -> WindowId {
        let id = self.windows.add_window(window);
        self.sync_focus();
        id
    }

    pub fn remove_window(&mut self, id: WindowId) -> CloseOutcome {
        let outcome = self.windows.remove_window(id);
        self.sync_focus();
        outcome
    }

    pub fn set_active_window(&mut self, id: WindowId) -> bool {
        let activated = self.windows.set_active_window(id);
        self.sync_focus();
        activated
    }

    pub fn focus_control(&mut self, window: WindowId, control: ControlId) -> bool {
        self.sync_focus();
        self.router
            .focus_control(&mut self.windows, window, control, Instant::now())
    }

    /// Tab (`forward`) or Shift+Tab through the focused window's controls.
    pub fn focus_next(&mut self, forward: bool) -> bool {
        self.sync_focus();
        self.router
            .focus_next(&mut self.windows, forward, Instant::now())
    }

    pub fn register_shortcut(
        &mut self,
        combo: KeyCombo,
        description: impl Into<String>,
        handler: impl FnMut(&mut ShortcutContext<'_>) -> bool + 'static,
    ) -> ShortcutId {
        self.router
            .shortcuts_mut()
            .register(combo, description, handler)
    }

    pub fn unregister_shortcut(&mut self, id: ShortcutId) -> bool {
        self.router.shortcuts_mut().unregister(id)
    }

    pub fn on_focus_changed(&self, handler: impl FnMut(&FocusChange) + 'static) -> SubscriptionId {
        self.router.on_focus_changed(handler)
    }

    pub fn unsubscribe_focus_changed(&self, id: SubscriptionId) -> bool {
        self.router.unsubscribe_focus_changed(id)
    }

    pub fn on_window_closed(&self, handler: impl FnMut(&WindowClosed) + 'static) -> SubscriptionId {
        self.windows.on_window_closed(handler)
    }

    pub fn unsubscribe_window_closed(&self, id: SubscriptionId) -> bool {
        self.windows.unsubscribe_window_closed(id)
    }

    /// Same as posting through a handle, for callers on the session thread.
    pub fn post(&self, request: MutationRequest) -> bool {
        self.handle.post(request)
    }

    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    /// Close `id` after `delay` unless the returned task is cancelled.
    /// Closing a window that is already gone does nothing.
    pub fn auto_close(&self, id: WindowId, delay: Duration) -> TaskHandle {
        self.scheduler().after(delay, move |session: &mut Session| {
            if session.windows.contains(id) {
                tracing::debug!(window_id = %id, "auto-closing window");
                session.remove_window(id);
            }
        })
    }

    pub fn after(
        &self,
        delay: Duration,
        task: impl FnOnce(&mut Session) + Send + 'static,
    ) -> TaskHandle {
        self.scheduler().after(delay, task)
    }

    pub fn every(
        &self,
        period: Duration,
        task: impl FnMut(&mut Session) + Send + 'static,
    ) -> TaskHandle {
        self.scheduler().every(period, task)
    }

    /// Apply everything queued so far. Returns how many requests ran.
    pub fn apply_pending_requests(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(request) = self.requests.try_recv() {
            if self.apply_request(request) {
                applied += 1;
            }
        }
        if applied > 0 {
            self.sync_focus();
        }
        applied
    }

    fn apply_request(&mut self, request: MutationRequest) -> bool {
        match request {
            MutationRequest::Apply(f) => f(self),
            MutationRequest::Input(event) => {
                if self.is_ui_blocked() {
                    tracing::debug!(?event, "background input rejected while a modal window is open");
                    return false;
                }
                self.handle_event(&event);
            }
            MutationRequest::CloseWindow(id) => {
                self.remove_window(id);
            }
            MutationRequest::Cancellable { token, request } => {
                if token.is_cancelled() {
                    tracing::trace!("dropping cancelled request");
                    return false;
                }
                return self.apply_request(*request);
            }
            MutationRequest::Quit => self.quit = true,
        }
        true
    }

    /// Route one input event. Resize events resize the desktop to the size
    /// they carry.
    pub fn handle_event(&mut self, event: &Event) -> RouteOutcome {
        let outcome = self.router.route(&mut self.windows, event, Instant::now());
        if let RouteOutcome::Resized(size) = outcome {
            self.resize_desktop(size);
        }
        outcome
    }

    pub fn resize_desktop(&mut self, size: Size) -> bool {
        let resized = self.windows.set_desktop_size(size);
        self.sync_focus();
        resized
    }

    /// Compose and present one frame.
    ///
    /// A failed frame is retried on the next call with nothing lost. Only
    /// after `max_driver_failures` failures in a row is the error returned;
    /// the count then starts over, so the session stays usable.
    pub fn render<O>(&mut self, output: &mut O) -> DeskResult<Option<FrameReport>>
    where
        O: OutputDriver + ?Sized,
    {
        match self
            .compositor
            .render_frame(&mut self.windows, output, Instant::now())
        {
            Ok(report) => {
                self.driver_failures = 0;
                Ok(Some(report))
            }
            Err(source) => {
                self.driver_failures += 1;
                if self.driver_failures < self.config.max_driver_failures {
                    return Ok(None);
                }
                let attempts = self.driver_failures;
                self.driver_failures = 0;
                tracing::warn!(attempts, error = %source, "output driver keeps failing");
                Err(DeskError::DriverFailed { attempts, source })
            }
        }
    }

    /// One cycle without input: apply queued requests, then render.
    pub fn tick<O>(&mut self, output: &mut O) -> DeskResult<Option<FrameReport>>
    where
        O: OutputDriver + ?Sized,
    {
        self.apply_pending_requests();
        self.render(output)
    }

    /// Take over the terminal and run until a quit is requested.
    ///
    /// On resize the size is re-read from `output` rather than trusted
    /// from the event; if that read fails the event's size is used. The
    /// terminal is restored on the way out, error or not.
    pub fn run<I, O>(&mut self, input: I, output: &mut O) -> DeskResult<()>
    where
        I: InputDriver,
        O: OutputDriver + ?Sized,
    {
        output.enter()?;
        let mut event_loop = EventLoop::new(input, self.config.poll_interval);
        let result = self.drive(&mut event_loop, output);
        let _ = event_loop.driver().set_mouse_capture(false);
        let restored = output.exit();
        result?;
        restored?;
        Ok(())
    }

    fn drive<I, O>(&mut self, event_loop: &mut EventLoop<I>, output: &mut O) -> DeskResult<()>
    where
        I: InputDriver,
        O: OutputDriver + ?Sized,
    {
        event_loop.driver().set_mouse_capture(true)?;
        let size = output.size()?;
        self.resize_desktop(size);
        self.quit = false;
        event_loop.run(|_, event| -> DeskResult<ControlFlow> {
            match event {
                None => {
                    self.tick(output)?;
                }
                Some(Event::Resize(width, height)) => {
                    let size = output.size().unwrap_or_else(|err| {
                        tracing::warn!(
                            error = %err,
                            width,
                            height,
                            "terminal size query failed, using the event's size"
                        );
                        Size::new(width, height)
                    });
                    self.handle_event(&Event::Resize(size.width, size.height));
                }
                Some(event) => {
                    self.handle_event(&event);
                }
            }
            Ok(if self.quit {
                ControlFlow::Quit
            } else {
                ControlFlow::Continue
            })
        })
    }
}
