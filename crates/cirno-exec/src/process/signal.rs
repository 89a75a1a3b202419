//! `kill(2)` and `killpg(2)` with the scheduler's signal mapping.
use std::io;

use cirno_core::{Delivery, Pid};
use cirno_model::SignalKind;

pub(super) fn kill(pid: Pid, signal: SignalKind) -> io::Result<Delivery> {
    unix_impl::kill(pid, signal)
}

pub(super) fn killpg(pgid: Pid, signal: SignalKind) -> io::Result<Delivery> {
    unix_impl::killpg(pgid, signal)
}

#[cfg(unix)]
mod unix_impl {
    use std::io;

    use cirno_core::{Delivery, Pid};
    use cirno_model::SignalKind;

    pub fn raw(signal: SignalKind) -> libc::c_int {
        match signal {
            SignalKind::Notify => libc::SIGALRM,
            SignalKind::Stop => libc::SIGTERM,
            SignalKind::Kill => libc::SIGKILL,
        }
    }

    /// Pid 0 and negative pids address whole groups in `kill(2)`; never let one through.
    fn target(pid: Pid) -> io::Result<libc::pid_t> {
        match libc::pid_t::try_from(pid) {
            Ok(raw) if raw > 0 => Ok(raw),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to signal pid {pid}"),
            )),
        }
    }

    pub fn kill(pid: Pid, signal: SignalKind) -> io::Result<Delivery> {
        let target = target(pid)?;
        let rc = unsafe { libc::kill(target, raw(signal)) };
        delivery(rc)
    }

    pub fn killpg(pgid: Pid, signal: SignalKind) -> io::Result<Delivery> {
        let target = target(pgid)?;
        let rc = unsafe { libc::killpg(target, raw(signal)) };
        delivery(rc)
    }

    fn delivery(rc: libc::c_int) -> io::Result<Delivery> {
        if rc == 0 {
            return Ok(Delivery::Delivered);
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(Delivery::AlreadyGone)
        } else {
            Err(err)
        }
    }
}

#[cfg(not(unix))]
mod unix_impl {
    use std::io;

    use cirno_core::{Delivery, Pid};
    use cirno_model::SignalKind;

    pub fn kill(_: Pid, _: SignalKind) -> io::Result<Delivery> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "signals need unix"))
    }

    pub fn killpg(_: Pid, _: SignalKind) -> io::Result<Delivery> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "signals need unix"))
    }
}
