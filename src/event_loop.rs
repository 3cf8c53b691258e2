use std::io;
use std::time::Duration;

use crossterm::event::Event;

use crate::drivers::InputDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    Continue,
    Quit,
}

/// Drives the UI thread: polls the input driver and hands every event to a
/// handler closure.
///
/// The handler sees `None` once per cycle before input is read, which is
/// where the session applies queued mutations and renders. When input is
/// waiting, the whole burst is drained before the next `None`, so a fast
/// drag or scroll never leaves rendering a frame behind per event.
pub struct EventLoop<D> {
    driver: D,
    poll_interval: Duration,
}

impl<D: InputDriver> EventLoop<D> {
    pub fn new(driver: D, poll_interval: Duration) -> Self {
        Self {
            driver,
            poll_interval,
        }
    }

    pub fn poll(&mut self) -> io::Result<Option<Event>> {
        if self.driver.poll(self.poll_interval)? {
            Ok(Some(self.driver.read()?))
        } else {
            Ok(None)
        }
    }

    pub fn driver(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Run until the handler returns [`ControlFlow::Quit`] or an error.
    pub fn run<F, E>(&mut self, mut handler: F) -> Result<(), E>
    where
        F: FnMut(&mut D, Option<Event>) -> Result<ControlFlow, E>,
        E: From<io::Error>,
    {
        loop {
            if let ControlFlow::Quit = handler(&mut self.driver, None)? {
                break;
            }

            if self.driver.poll(self.poll_interval)? {
                loop {
                    let event = self.driver.read()?;
                    if let ControlFlow::Quit = handler(&mut self.driver, Some(event))? {
                        return Ok(());
                    }
                    if !self.driver.poll(Duration::from_millis(0))? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::headless::ScriptedInput;

    #[test]
    fn bursts_are_drained_between_idle_ticks() {
        let input: ScriptedInput = [Event::Resize(1, 1), Event::Resize(2, 2)]
            .into_iter()
            .collect();
        let mut event_loop = EventLoop::new(input, Duration::ZERO);
        let mut seen = Vec::new();
        let mut ticks = 0;
        event_loop
            .run(|_, event| -> io::Result<ControlFlow> {
                match event {
                    Some(event) => seen.push(event),
                    None => {
                        ticks += 1;
                        if ticks == 2 {
                            return Ok(ControlFlow::Quit);
                        }
                    }
                }
                Ok(ControlFlow::Continue)
            })
            .unwrap();
        assert_eq!(seen, vec![Event::Resize(1, 1), Event::Resize(2, 2)]);
        assert_eq!(ticks, 2);
    }
}
