//! Command helper methods for Test.

use std::process::Output;

use assert_cmd::Command;

use super::Test;

impl Test {
    /// Create a keyrack command confined to this environment.
    ///
    /// Returns a Command configured with:
    /// - HOME, KEYRACK_HOME and KEYRACK_RUNTIME_DIR pointing into temp dirs
    /// - owner, prikey and log overrides from the outer environment removed
    /// - current directory set to the test project directory
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("keyrack").expect("failed to find keyrack binary");
        cmd.env("HOME", self.home.path())
            .env("KEYRACK_HOME", self.keyrack_home())
            .env("KEYRACK_RUNTIME_DIR", self.runtime.path())
            .env("NO_COLOR", "1")
            .env_remove("KEYRACK_OWNER")
            .env_remove("KEYRACK_PRIKEY")
            .env_remove("KEYRACK_LOG")
            .env_remove("SSH_AUTH_SOCK")
            .current_dir(self.dir.path());
        cmd
    }

    /// Run `keyrack <args>`.
    pub fn run(&self, args: &[&str]) -> Output {
        self.cmd().args(args).output().expect("failed to run keyrack")
    }

    /// Run `keyrack <args>` with `stdin` piped in.
    pub fn run_with_stdin(&self, args: &[&str], stdin: &str) -> Output {
        self.cmd()
            .args(args)
            .write_stdin(stdin)
            .output()
            .expect("failed to run keyrack")
    }

    /// `keyrack set` for a storage vault, piping the secret.
    pub fn set_stored(&self, key: &str, env: &str, vault: &str, secret: &str) -> Output {
        self.run_with_stdin(
            &["set", "--key", key, "--env", env, "--vault", vault],
            secret,
        )
    }

    /// `keyrack get --key <key> --env <env>`.
    pub fn get(&self, key: &str, env: &str) -> Output {
        self.run(&["get", "--key", key, "--env", env])
    }
}
