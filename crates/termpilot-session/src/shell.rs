//! Shell integration: marker scripts, script injection and verification.
//!
//! The scripts make the shell emit `OSC 133` markers around each prompt, so
//! a session can tell when a command finished and with which status.
//! Scripts are injected as a single base64 decode-and-execute line, which
//! keeps multi-line snippets out of the shell's line editor.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{info, warn};
use uuid::Uuid;

use termpilot_core::{Shell, TextPattern};

use crate::session::Session;
use crate::wait::WaitOptions;

/// Bash snippet reporting the previous exit status and the prompt start.
pub const BASH_INTEGRATION_SCRIPT: &str = r#"
__termpilot_prompt() {
    printf "\033]133;D;%s\007" "$?"
    printf "\033]133;A\007"
}

if [[ ! "$PROMPT_COMMAND" == *"__termpilot_prompt"* ]]; then
    PROMPT_COMMAND="${PROMPT_COMMAND:+$PROMPT_COMMAND; }__termpilot_prompt"
fi
"#;

/// PowerShell snippet wrapping `prompt` with the same markers.
pub const PWSH_INTEGRATION_SCRIPT: &str = r#"
if (-not (Test-Path function:__termpilot_original_prompt)) {
    if (Test-Path function:prompt) {
        $__termpilot_saved = $function:prompt
        Set-Item function:__termpilot_original_prompt $__termpilot_saved
    } else {
        function __termpilot_original_prompt { "PS > " }
    }
}

function prompt {
    $termpilotExit = $LASTEXITCODE
    [Console]::Out.Write("$([char]27)]133;D;$termpilotExit$([char]7)")
    [Console]::Out.Write("$([char]27)]133;A$([char]7)")
    & __termpilot_original_prompt
    [Console]::Out.Write("$([char]27)]133;B$([char]7)")
}
"#;

/// Default time to wait for the verification sentinel.
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

const SENTINEL_HEAD: &str = "__TERMPILOT_";

/// Integration script for `shell`.
pub fn integration_script(shell: Shell) -> &'static str {
    match shell {
        Shell::Bash => BASH_INTEGRATION_SCRIPT,
        Shell::Pwsh => PWSH_INTEGRATION_SCRIPT,
    }
}

/// Encode `script` as one line that `shell` decodes and runs in place.
pub fn encode_script_for_shell(script: &str, shell: Shell) -> String {
    let b64 = STANDARD.encode(script.as_bytes());
    match shell {
        Shell::Bash => format!("eval \"$(echo '{b64}' | base64 -d)\""),
        Shell::Pwsh => format!(
            "$c=[System.Convert]::FromBase64String('{b64}');iex([System.Text.Encoding]::UTF8.GetString($c))"
        ),
    }
}

/// Command printing `sentinel` without the sentinel appearing verbatim in
/// the command line itself.
fn verify_command(shell: Shell, sentinel_tail: &str) -> String {
    match shell {
        Shell::Bash => format!("echo \"{SENTINEL_HEAD}\"\"{sentinel_tail}\""),
        Shell::Pwsh => format!("Write-Output (\"{SENTINEL_HEAD}\" + \"{sentinel_tail}\")"),
    }
}

impl Session {
    /// Run `script` in the shell through a single encoded command line.
    pub fn inject_script(&self, script: &str, shell: Shell) {
        self.execute_line(&encode_script_for_shell(script, shell));
    }

    /// Install the integration script and confirm the shell runs it.
    ///
    /// `shell` defaults to a guess from the process name. Returns `false`
    /// when the verification sentinel does not appear within `timeout`.
    pub async fn enable_shell_integration(&self, shell: Option<Shell>, timeout: Duration) -> bool {
        let shell = shell.unwrap_or_else(|| Shell::detect(&self.process_name()));
        info!(
            "Enabling shell integration: id={}, shell={}",
            self.id(),
            shell
        );

        let tail = format!("OK_{}", Uuid::new_v4().simple());
        let sentinel = format!("{SENTINEL_HEAD}{tail}");

        self.inject_script(integration_script(shell), shell);
        self.execute_line(&verify_command(shell, &tail));

        let options = WaitOptions::new().with_timeout(timeout);
        match self
            .wait_for_text(&TextPattern::literal(sentinel), options)
            .await
        {
            Ok(()) => {
                info!("Shell integration verified: id={}", self.id());
                true
            }
            Err(e) => {
                warn!(
                    "Shell integration verification failed: id={}: {}",
                    self.id(),
                    e
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use termpilot_emulator::MemoryTransport;

    use crate::session::SessionOptions;

    fn decode(b64: &str) -> String {
        String::from_utf8(STANDARD.decode(b64).unwrap()).unwrap()
    }

    #[test]
    fn test_encode_bash() {
        let line = encode_script_for_shell("echo hi", Shell::Bash);
        let b64 = line
            .strip_prefix("eval \"$(echo '")
            .and_then(|rest| rest.strip_suffix("' | base64 -d)\""))
            .unwrap();
        assert_eq!(decode(b64), "echo hi");
    }

    #[test]
    fn test_encode_pwsh() {
        let line = encode_script_for_shell("Write-Output 1", Shell::Pwsh);
        let b64 = line
            .strip_prefix("$c=[System.Convert]::FromBase64String('")
            .and_then(|rest| {
                rest.strip_suffix("');iex([System.Text.Encoding]::UTF8.GetString($c))")
            })
            .unwrap();
        assert_eq!(decode(b64), "Write-Output 1");
    }

    #[test]
    fn test_scripts_emit_markers() {
        assert!(BASH_INTEGRATION_SCRIPT.contains("133;D;%s"));
        assert!(BASH_INTEGRATION_SCRIPT.contains("133;A"));
        assert!(PWSH_INTEGRATION_SCRIPT.contains("133;D;$termpilotExit"));
        assert!(PWSH_INTEGRATION_SCRIPT.contains("133;B"));
    }

    #[test]
    fn test_verify_command_hides_sentinel() {
        let command = verify_command(Shell::Bash, "OK_abc");
        assert!(!command.contains("__TERMPILOT_OK_abc"));
        let command = verify_command(Shell::Pwsh, "OK_abc");
        assert!(!command.contains("__TERMPILOT_OK_abc"));
    }

    #[tokio::test]
    async fn test_enable_succeeds_when_shell_prints_sentinel() {
        let transport = MemoryTransport::new();
        transport.respond_with(|data, transport| {
            let line = String::from_utf8_lossy(data);
            if let Some(rest) = line.strip_prefix("echo \"__TERMPILOT_\"\"") {
                let tail = rest.trim_end_matches('\r').trim_end_matches('"');
                transport.emit(format!("__TERMPILOT_{tail}\r\n"));
            }
        });
        let session = Session::new(Arc::new(transport.clone()), SessionOptions::default());
        session.spawn().unwrap();

        assert!(
            session
                .enable_shell_integration(None, Duration::from_secs(1))
                .await
        );
        let writes = transport.written_text();
        assert_eq!(writes.len(), 2);
        assert!(writes[0].starts_with("eval \"$(echo '"));
        assert!(writes[0].ends_with('\r'));
    }

    #[tokio::test]
    async fn test_enable_fails_without_sentinel() {
        let transport = MemoryTransport::echo();
        let session = Session::new(Arc::new(transport), SessionOptions::default());
        session.spawn().unwrap();
        assert!(
            !session
                .enable_shell_integration(Some(Shell::Bash), Duration::from_millis(100))
                .await
        );
    }

    #[tokio::test]
    async fn test_pwsh_detected_from_process_name() {
        let transport = MemoryTransport::with_process_name("pwsh");
        let session = Session::new(Arc::new(transport.clone()), SessionOptions::default());
        session.spawn().unwrap();
        session
            .enable_shell_integration(None, Duration::from_millis(20))
            .await;
        let writes = transport.written_text();
        assert!(writes[0].starts_with("$c=[System.Convert]"));
        assert!(writes[1].starts_with("Write-Output (\"__TERMPILOT_\""));
    }
}
