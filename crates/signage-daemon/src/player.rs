use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tracing::{info, warn};

/// Grace period between SIGTERM and SIGKILL on stop.
const STOP_GRACE: Duration = Duration::from_secs(5);
/// How long a freshly spawned mpv must survive before we trust the backend.
const LIVENESS_PROBE: Duration = Duration::from_secs(2);

/// Concrete backend that "auto" maps to on a headless Pi.
const DEFAULT_BACKEND: &str = "drm";
/// Tried when the configured backend fails its liveness probe.
const FALLBACK_BACKEND: &str = "gbm";

enum Target<'a> {
    Waiting,
    Media(&'a str),
}

impl Target<'_> {
    fn describe(&self) -> String {
        match self {
            Target::Waiting => "waiting screen".to_string(),
            Target::Media(url) => format!("media {}", url),
        }
    }
}

/// Owns the single mpv display subprocess.
///
/// Every start goes through stop() first, so at most one subprocess is ever
/// alive. Launching walks the backend-candidate list until one survives the
/// liveness probe.
pub struct Player {
    child: Option<tokio::process::Child>,
    output_backend: String,
    waiting_image: PathBuf,
    /// When set, used instead of PATH discovery.
    mpv_binary: Option<PathBuf>,
}

impl Player {
    pub fn new(output_backend: String, waiting_image: PathBuf) -> Self {
        Self {
            child: None,
            output_backend,
            waiting_image,
            mpv_binary: None,
        }
    }

    #[cfg(test)]
    fn with_binary(mut self, binary: PathBuf) -> Self {
        self.mpv_binary = Some(binary);
        self
    }

    #[cfg(test)]
    fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    pub async fn start_waiting(&mut self) -> anyhow::Result<()> {
        self.launch(Target::Waiting).await
    }

    pub async fn start_media(&mut self, url: &str) -> anyhow::Result<()> {
        self.launch(Target::Media(url)).await
    }

    /// SIGTERM, bounded wait, then hard kill. Idempotent; the tracked
    /// handle is always cleared.
    pub async fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if let Some(pid) = child.id() {
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
            if tokio::time::timeout(STOP_GRACE, child.wait()).await.is_ok() {
                return;
            }
            warn!("mpv did not exit within {:?}, killing", STOP_GRACE);
        }
        let _ = child.kill().await;
    }

    /// Non-blocking crash check, called once per loop tick. Returns the
    /// exit code (if any) when a tracked subprocess has exited on its own,
    /// clearing the handle.
    pub fn poll_exit(&mut self) -> Option<Option<i32>> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                self.child = None;
                Some(status.code())
            }
            Ok(None) => None,
            Err(e) => {
                warn!("could not poll mpv status: {}", e);
                self.child = None;
                Some(None)
            }
        }
    }

    async fn launch(&mut self, target: Target<'_>) -> anyhow::Result<()> {
        self.stop().await;

        let binary = self
            .mpv_binary
            .clone()
            .or_else(signage_core::platform::find_mpv_binary)
            .ok_or_else(|| anyhow::anyhow!("mpv not found on PATH (install mpv)"))?;

        for backend in backend_candidates(&self.output_backend) {
            let args = match &target {
                Target::Waiting => waiting_args(&backend, &self.waiting_image),
                Target::Media(url) => media_args(&backend, url),
            };
            // Own process group, so a terminal SIGINT reaches the daemon's
            // teardown path instead of hitting mpv directly.
            let mut child = match tokio::process::Command::new(&binary)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .process_group(0)
                .spawn()
            {
                Ok(child) => child,
                Err(e) => {
                    warn!("output backend {}: spawn failed: {}", backend, e);
                    continue;
                }
            };

            tokio::time::sleep(LIVENESS_PROBE).await;
            match child.try_wait() {
                Ok(Some(status)) => {
                    warn!(
                        "output backend {} failed liveness probe (exit {:?})",
                        backend,
                        status.code()
                    );
                    continue;
                }
                Err(e) => {
                    warn!("output backend {}: status check failed: {}", backend, e);
                    let _ = child.kill().await;
                    continue;
                }
                Ok(None) => {}
            }

            info!("mpv started: {} via --vo={}", target.describe(), backend);
            self.child = Some(child);
            return Ok(());
        }

        anyhow::bail!("all output backends failed for {}", target.describe())
    }
}

/// Ordered output backends to try: the configured one (with "auto" resolved
/// to the headless default), then one fallback.
fn backend_candidates(configured: &str) -> Vec<String> {
    let primary = if configured == "auto" {
        DEFAULT_BACKEND
    } else {
        configured
    };
    let fallback = if primary == FALLBACK_BACKEND {
        DEFAULT_BACKEND
    } else {
        FALLBACK_BACKEND
    };
    if primary == fallback {
        vec![primary.to_string()]
    } else {
        vec![primary.to_string(), fallback.to_string()]
    }
}

/// Flags shared by both playback modes: full-screen, no OSD, no default key
/// bindings, no audio visualisation.
fn common_args(backend: &str) -> Vec<String> {
    vec![
        "--fs".to_string(),
        "--no-osd".to_string(),
        "--no-input-default-bindings".to_string(),
        "--no-audio-display".to_string(),
        format!("--vo={}", backend),
    ]
}

fn media_args(backend: &str, url: &str) -> Vec<String> {
    let mut args = common_args(backend);
    args.push("--loop-playlist=inf".to_string());
    args.push(url.to_string());
    args
}

fn waiting_args(backend: &str, image: &std::path::Path) -> Vec<String> {
    let mut args = common_args(backend);
    args.push("--loop-file=inf".to_string());
    args.push("--image-display-duration=inf".to_string());
    args.push(image.display().to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_resolves_to_drm_with_gbm_fallback() {
        assert_eq!(backend_candidates("auto"), vec!["drm", "gbm"]);
    }

    #[test]
    fn test_explicit_drm_keeps_gbm_fallback() {
        assert_eq!(backend_candidates("drm"), vec!["drm", "gbm"]);
    }

    #[test]
    fn test_gbm_falls_back_to_drm() {
        assert_eq!(backend_candidates("gbm"), vec!["gbm", "drm"]);
    }

    #[test]
    fn test_other_backend_keeps_gbm_fallback() {
        assert_eq!(backend_candidates("rpi"), vec!["rpi", "gbm"]);
    }

    #[test]
    fn test_media_args() {
        let args = media_args("drm", "http://server/media/promo.mp4");
        assert_eq!(
            args,
            vec![
                "--fs",
                "--no-osd",
                "--no-input-default-bindings",
                "--no-audio-display",
                "--vo=drm",
                "--loop-playlist=inf",
                "http://server/media/promo.mp4",
            ]
        );
    }

    #[test]
    fn test_waiting_args() {
        let args = waiting_args("gbm", std::path::Path::new("/var/lib/signage/waiting.png"));
        assert_eq!(
            args,
            vec![
                "--fs",
                "--no-osd",
                "--no-input-default-bindings",
                "--no-audio-display",
                "--vo=gbm",
                "--loop-file=inf",
                "--image-display-duration=inf",
                "/var/lib/signage/waiting.png",
            ]
        );
    }

    #[tokio::test]
    async fn test_stop_without_child_is_noop() {
        let mut player = Player::new("auto".to_string(), PathBuf::from("/tmp/waiting.png"));
        player.stop().await;
        player.stop().await;
        assert!(player.poll_exit().is_none());
    }

    /// Drops an executable stand-in for mpv into `dir`.
    fn write_shim(dir: &std::path::Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("mpv");
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn shim_player(dir: &tempfile::TempDir, shim: PathBuf) -> Player {
        Player::new("auto".to_string(), dir.path().join("waiting.png")).with_binary(shim)
    }

    #[tokio::test]
    async fn test_fallback_backend_survives_when_primary_exits() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("launches.log");
        // First candidate (drm) dies before the probe window ends, the
        // fallback stays up; every spawn appends its argv to the log.
        let shim = write_shim(
            dir.path(),
            &format!(
                "#!/bin/sh\necho \"$@\" >> {}\ncase \"$@\" in *--vo=drm*) exit 7 ;; esac\nexec sleep 30\n",
                log.display()
            ),
        );
        let mut player = shim_player(&dir, shim);

        player.start_waiting().await.unwrap();
        assert!(player.poll_exit().is_none());

        let launches = std::fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = launches.lines().collect();
        assert_eq!(lines.len(), 2, "one failed candidate, one survivor");
        assert!(lines[0].contains("--vo=drm"));
        assert!(lines[1].contains("--vo=gbm"));

        player.stop().await;
    }

    #[tokio::test]
    async fn test_all_backends_failing_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let shim = write_shim(dir.path(), "#!/bin/sh\nexit 1\n");
        let mut player = shim_player(&dir, shim);

        assert!(player.start_media("http://server/media/a.mp4").await.is_err());
        assert!(player.poll_exit().is_none(), "no subprocess is tracked after failure");
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut player = shim_player(&dir, dir.path().join("no-such-mpv"));
        assert!(player.start_waiting().await.is_err());
        assert!(player.poll_exit().is_none());
    }

    #[tokio::test]
    async fn test_stop_terminates_live_child() {
        let dir = tempfile::TempDir::new().unwrap();
        let shim = write_shim(dir.path(), "#!/bin/sh\nexec sleep 30\n");
        let mut player = shim_player(&dir, shim);

        player.start_waiting().await.unwrap();
        let pid = player.pid().unwrap() as libc::pid_t;
        // Detached into its own process group.
        assert_eq!(unsafe { libc::getpgid(pid) }, pid);

        player.stop().await;
        assert!(player.poll_exit().is_none());
        // Reaped: the old pid no longer names a live process.
        assert_eq!(unsafe { libc::kill(pid, 0) }, -1);
    }

    #[tokio::test]
    async fn test_stop_after_child_already_exited() {
        let dir = tempfile::TempDir::new().unwrap();
        let shim = write_shim(dir.path(), "#!/bin/sh\nexec sleep 30\n");
        let mut player = shim_player(&dir, shim);

        player.start_waiting().await.unwrap();
        let pid = player.pid().unwrap() as libc::pid_t;
        unsafe {
            libc::kill(pid, libc::SIGKILL);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Must return promptly and leave nothing tracked.
        player.stop().await;
        assert!(player.poll_exit().is_none());
    }
}
