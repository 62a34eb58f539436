//! Child process lifetime for linter invocations.

use tokio::process::{Child, Command};

/// Kills the child (and its process group on Unix) on drop unless disarmed.
///
/// Wrap a spawned child immediately after `spawn()` so that a cancelled or
/// timed-out run cannot leave actionlint, or the shellcheck/pyflakes helpers
/// it forks, running in the background. Call [`ChildGuard::disarm`] once the
/// process has been reaped.
pub struct ChildGuard {
    child: Child,
    armed: bool,
}

impl ChildGuard {
    #[must_use]
    pub fn new(child: Child) -> Self {
        Self { child, armed: true }
    }

    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        #[cfg(unix)]
        {
            let group = self.child.id().and_then(|pid| i32::try_from(pid).ok());
            let killed_group = group.is_some_and(|pgid| unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0);
            if !killed_group {
                let _ = self.child.start_kill();
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }
        let _ = self.child.try_wait();
    }
}

/// Put the child in its own session so the whole tree can be killed at once.
#[cfg(unix)]
pub fn set_new_session(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        cmd.as_std_mut().pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            // Linux-only: the child dies with the server even on SIGKILL.
            #[cfg(target_os = "linux")]
            if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
pub fn set_new_session(_cmd: &mut Command) {}
