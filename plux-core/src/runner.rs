//! The single-threaded cooperative scheduler: owns every spawned shell,
//! the shared variable store, and the call stack, and drives one script
//! (plus whatever it calls or includes) to completion.
//!
//! One object holds all mutable run state; `run_line` loops a match line
//! against fresh I/O until it resolves or times out, and a poll-driven
//! wait step multiplexes every live shell.

use std::collections::HashMap;
use std::os::fd::BorrowedFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;

use crate::ast::{Line, LineKind, Script, ScriptEnv};
use crate::callstack::CallStack;
use crate::config::Config;
use crate::error::Error;
use crate::escape::unescape_send_output;
use crate::expand::expand;
use crate::loader::ScriptLoader;
use crate::log::{FileShellLog, NullShellLog, ProgressLog, ShellLog};
use crate::process::Process;
use crate::regex::Regex;
use crate::results::{LineStatus, RunStatus, ScriptResult};
use crate::signal;
use crate::sourceinfo::SourceInfo;
use crate::sys::pipe::PipeProcess;
use crate::sys::poll::{PollOutcome, poll_ready};
use crate::sys::pty::PtyShell;
use crate::timing::Timeout;
use crate::variables::{VarScope, VarStore};

/// Default path of the script-wide progress log.
const PROGRESS_LOG_PATH: &str = "plux.progress.log";

/// Per-script context pushed while [`Runner::run`] is executing it: where
/// relative `[include]` paths resolve against, the script's own
/// `[process]` registrations, and the `ScriptEnv` its `[call]`s resolve
/// functions against.
struct ScriptFrame {
    dir: PathBuf,
    process_defs: HashMap<String, Vec<String>>,
    env: ScriptEnv,
}

/// Owns every live shell and drives a script (and anything it calls or
/// includes) to completion.
pub struct Runner {
    cfg: Config,
    loader: Box<dyn ScriptLoader>,
    vars: VarStore,
    shells: IndexMap<String, Box<dyn Process>>,
    shell_logs: IndexMap<String, Box<dyn ShellLog>>,
    progress_log: ProgressLog,
    call_stack: CallStack,
    shell_hook_init: Option<String>,
    script_frames: Vec<ScriptFrame>,
}

impl Runner {
    /// Builds a fresh runner: seeds `VarStore` from the process
    /// environment and opens the progress log at [`PROGRESS_LOG_PATH`].
    ///
    /// # Errors
    ///
    /// Returns an error if the progress log cannot be opened.
    pub fn new(cfg: Config, loader: Box<dyn ScriptLoader>) -> std::io::Result<Self> {
        Ok(Self {
            cfg,
            loader,
            vars: VarStore::from_process_env(),
            shells: IndexMap::new(),
            shell_logs: IndexMap::new(),
            progress_log: ProgressLog::open(Path::new(PROGRESS_LOG_PATH))?,
            call_stack: CallStack::new(),
            shell_hook_init: None,
            script_frames: Vec::new(),
        })
    }

    /// Runs `script`'s headers, then (if they succeeded) its body, then
    /// always its cleanup section, regardless of how the body finished.
    pub fn run(&mut self, script: &Script) -> ScriptResult {
        self.script_frames.push(ScriptFrame {
            dir: script
                .file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
            process_defs: script.process_defs.clone(),
            env: script.env.clone(),
        });

        let mut result = self.run_lines(&script.headers);
        if result.is_ok() {
            result = self.run_lines(&script.body);
        }
        let cleanup_result = self.run_lines(&script.cleanup);
        if result.is_ok() {
            result = cleanup_result;
        } else if !cleanup_result.is_ok() {
            tracing::warn!("cleanup also failed after a prior error");
        }

        self.script_frames.pop();
        result
    }

    /// Cooperatively stops every live shell: `[shell].stop()` each, then
    /// best-effort `SIGKILL` + reap.
    pub fn stop_all(&mut self) {
        for (name, shell) in &mut self.shells {
            if let Err(err) = shell.stop() {
                tracing::warn!(shell = name.as_str(), %err, "failed to stop shell cleanly");
            }
        }
        for shell in self.shells.values() {
            if shell.is_alive() {
                let _ = nix::sys::signal::kill(shell.pid(), nix::sys::signal::Signal::SIGKILL);
            }
        }
        for shell in self.shells.values_mut() {
            if !shell.is_alive() {
                continue;
            }
            match nix::sys::wait::waitpid(shell.pid(), None) {
                Ok(status) => shell.set_alive(false, exit_code_of(&status)),
                Err(_) => shell.set_alive(false, -1),
            }
        }
    }

    fn run_lines(&mut self, lines: &[Line]) -> ScriptResult {
        for line in lines {
            if signal::stop_requested() {
                return ScriptResult::error(
                    RunStatus::Error,
                    line.info.clone(),
                    "run interrupted by signal",
                    self.call_stack.render(),
                );
            }
            if let Err(result) = self.run_line(line) {
                return result;
            }
        }
        ScriptResult::ok()
    }

    fn fail(&self, info: &SourceInfo, err: &Error) -> ScriptResult {
        ScriptResult::error(RunStatus::Error, info.clone(), err.to_string(), self.call_stack.render())
    }

    fn run_line(&mut self, line: &Line) -> Result<(), ScriptResult> {
        let scoping_shell = self.call_stack.current_shell().unwrap_or("").to_string();
        let effective_shell = match expand(&self.vars, &scoping_shell, &line.shell) {
            Ok(expanded) if expanded.is_empty() => scoping_shell,
            Ok(expanded) => expanded,
            Err(err) => return Err(self.fail(&line.info, &err)),
        };

        if !effective_shell.is_empty() {
            self.ensure_shell(&line.info, &effective_shell)?;
        }

        let timeout_ms = if effective_shell.is_empty() {
            self.cfg.default_timeout_ms
        } else {
            self.shells
                .get(effective_shell.as_str())
                .map_or(self.cfg.default_timeout_ms, |s| s.timeout_ms())
        };
        let timeout = Timeout::new(timeout_ms);

        let status = loop {
            match self.eval_line_once(line, &effective_shell) {
                Ok(LineStatus::NoMatch) => {
                    if timeout.has_expired() {
                        return Err(ScriptResult::error(
                            RunStatus::Timeout,
                            line.info.clone(),
                            "timed out waiting for a match",
                            self.call_stack.render(),
                        ));
                    }
                    match self.poll_and_feed(timeout.get_ms_until_timeout()) {
                        Ok(true) => continue,
                        Ok(false) => {
                            return Err(ScriptResult::error(
                                RunStatus::Timeout,
                                line.info.clone(),
                                "timed out waiting for a match",
                                self.call_stack.render(),
                            ));
                        }
                        Err(err) => return Err(self.fail(&line.info, &err)),
                    }
                }
                Ok(other) => break other,
                Err(err) => return Err(self.fail(&line.info, &err)),
            }
        };

        match status {
            LineStatus::Ok | LineStatus::NoMatch => Ok(()),
            LineStatus::Call { name, args } => self.run_function(&line.info, &name, &args, &effective_shell),
            LineStatus::Include { path } => self.dispatch_include(&line.info, &path),
            LineStatus::Set { key, val } => {
                self.apply_set(&key, &val);
                Ok(())
            }
        }
    }

    /// One non-blocking attempt at `line`'s behavior against already
    /// buffered I/O: never itself suspends.
    fn eval_line_once(&mut self, line: &Line, shell: &str) -> Result<LineStatus, Error> {
        match &line.kind {
            LineKind::HeaderRequire { key, val } => {
                let have = self.vars.get("", key);
                let satisfied = match val {
                    Some(expected) => have == Some(expected.as_str()),
                    None => have.is_some(),
                };
                if satisfied {
                    Ok(LineStatus::Ok)
                } else {
                    Err(Error::script(
                        line.info.clone(),
                        format!("required configuration '{key}' is not satisfied"),
                    ))
                }
            }
            LineKind::HeaderSet { key, val } => {
                let expanded = expand(&self.vars, shell, val)?;
                Ok(LineStatus::Set { key: key.clone(), val: expanded })
            }
            LineKind::HeaderInclude { path } => {
                let expanded = expand(&self.vars, shell, path)?;
                Ok(LineStatus::Include { path: expanded })
            }
            LineKind::AssignGlobal { key, val } => {
                let expanded = expand(&self.vars, shell, val)?;
                self.vars.set(VarScope::Global, "", key.clone(), expanded)?;
                Ok(LineStatus::Ok)
            }
            LineKind::AssignShell { key, val } => {
                let expanded = expand(&self.vars, shell, val)?;
                self.vars.set(VarScope::Shell, shell, key.clone(), expanded)?;
                Ok(LineStatus::Ok)
            }
            LineKind::SendOutput { text } => self.send_output(shell, text),
            LineKind::MatchExact { pattern } => self.match_exact(shell, pattern),
            LineKind::MatchVar { pattern } => self.match_var(shell, pattern),
            LineKind::MatchRegex { pattern } => self.match_regex(shell, pattern),
            LineKind::SetErrorPattern { pattern } => {
                let expanded = expand(&self.vars, shell, pattern)?;
                let process = self.process_mut(shell)?;
                process.set_error_pattern(&expanded)?;
                Ok(LineStatus::Ok)
            }
            LineKind::Timeout { timeout_ms } => {
                let ms = if *timeout_ms == 0 { self.cfg.default_timeout_ms } else { *timeout_ms };
                if let Some(process) = self.shells.get_mut(shell) {
                    process.set_timeout_ms(ms);
                }
                Ok(LineStatus::Ok)
            }
            LineKind::Call { name, args } => {
                let name = expand(&self.vars, shell, name)?;
                let args = args
                    .iter()
                    .map(|a| expand(&self.vars, shell, a))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(LineStatus::Call { name, args })
            }
            LineKind::Progress { text } => {
                let expanded = expand(&self.vars, shell, text)?;
                self.progress_log.log(shell, &expanded);
                println!("[{shell}] {expanded}");
                Ok(LineStatus::Ok)
            }
            LineKind::Log { text } => {
                let expanded = expand(&self.vars, shell, text)?;
                self.progress_log.log(shell, &expanded);
                tracing::debug!(shell, message = expanded.as_str(), "log");
                Ok(LineStatus::Ok)
            }
        }
    }

    fn send_output(&mut self, shell: &str, text: &str) -> Result<LineStatus, Error> {
        let expanded = expand(&self.vars, shell, text)?;
        let unescaped = unescape_send_output(&expanded);
        let ctrl_c = self.vars.get(shell, "_CTRL_C_").unwrap_or_default().to_string();
        let mut payload = unescaped;
        if payload != ctrl_c {
            payload.push('\n');
        }

        let process = self.process_mut(shell)?;
        write_all_best_effort(process, payload.as_bytes())?;
        if let Some(log) = self.shell_logs.get_mut(shell) {
            log.input(payload.as_bytes());
        }
        Ok(LineStatus::Ok)
    }

    fn match_exact(&mut self, shell: &str, pattern: &str) -> Result<LineStatus, Error> {
        let (status, _groups) = run_match(self.process_mut(shell)?, |candidate, _is_partial| {
            Ok(candidate.contains(pattern).then(Vec::new))
        })?;
        Ok(status)
    }

    fn match_var(&mut self, shell: &str, pattern: &str) -> Result<LineStatus, Error> {
        let expanded = expand(&self.vars, shell, pattern)?;
        let (status, _groups) = run_match(self.process_mut(shell)?, |candidate, _is_partial| {
            Ok(candidate.contains(&expanded).then(Vec::new))
        })?;
        Ok(status)
    }

    fn match_regex(&mut self, shell: &str, pattern: &str) -> Result<LineStatus, Error> {
        let expanded = expand(&self.vars, shell, pattern)?;
        let regex = Regex::new(&expanded)?;
        let (status, groups) = run_match(self.process_mut(shell)?, |candidate, is_partial| {
            if is_partial && regex.is_end_anchored() {
                return Ok(None);
            }
            let found = regex.search(candidate)?;
            Ok(found.map(|gs| gs.into_iter().map(|g| g.unwrap_or_default().to_string()).collect()))
        })?;

        if matches!(status, LineStatus::Ok) {
            for (idx, group) in groups.iter().enumerate() {
                self.vars.set(VarScope::Shell, shell, (idx + 1).to_string(), group.clone())?;
            }
        }
        Ok(status)
    }

    fn process_mut(&mut self, shell: &str) -> Result<&mut dyn Process, Error> {
        self.shells
            .get_mut(shell)
            .map(|process| process.as_mut())
            .ok_or_else(|| Error::shell(shell, "no such shell"))
    }

    fn ensure_shell(&mut self, info: &SourceInfo, name: &str) -> Result<(), ScriptResult> {
        if self.shells.contains_key(name) {
            return Ok(());
        }

        let argv = self
            .script_frames
            .last()
            .and_then(|frame| frame.process_defs.get(name).cloned());
        let is_pty_shell = argv.is_none();

        let spawn_result: Result<Box<dyn Process>, Error> = match argv {
            Some(argv) => PipeProcess::spawn(name, &argv, self.cfg.default_timeout_ms)
                .map(|p| Box::new(p) as Box<dyn Process>),
            None => {
                PtyShell::spawn(name, self.cfg.default_timeout_ms).map(|p| Box::new(p) as Box<dyn Process>)
            }
        };
        let process = spawn_result.map_err(|err| self.fail(info, &err))?;
        self.shells.insert(name.to_string(), process);

        let log_result: std::io::Result<Box<dyn ShellLog>> = if name.is_empty() {
            Ok(Box::new(NullShellLog))
        } else {
            FileShellLog::open(&self.cfg.log_dir, name, self.cfg.tail).map(|l| Box::new(l) as Box<dyn ShellLog>)
        };
        let log = log_result.map_err(|err| self.fail(info, &Error::from(err)))?;
        self.shell_logs.insert(name.to_string(), log);

        if is_pty_shell {
            if let Some(hook) = self.shell_hook_init.clone() {
                self.run_function(info, &hook, &[], name)?;
            }
        }
        Ok(())
    }

    fn apply_set(&mut self, key: &str, val: &str) {
        match key {
            "shell_hook_init" => self.shell_hook_init = Some(val.to_string()),
            other => tracing::warn!(key = other, "ignoring unrecognized [config set]"),
        }
    }

    fn run_function(&mut self, call_info: &SourceInfo, name: &str, args: &[String], shell: &str) -> Result<(), ScriptResult> {
        let env = self.script_frames.last().map(|f| f.env.clone()).unwrap_or_default();

        let function = match env.get_function(name) {
            Some(function) => function,
            None => {
                // Parsing a builtin registers its `[function]` block into
                // `env` as a side effect; the returned `Script` itself
                // carries no executable headers/body/cleanup and is
                // discarded.
                match self.loader.load_builtin(name, env.clone()) {
                    Ok(Some(_)) | Ok(None) => {}
                    Err(err) => return Err(self.fail(call_info, &err)),
                }
                env.get_function(name)
                    .ok_or_else(|| self.fail(call_info, &Error::undefined_function(name)))?
            }
        };

        if function.param_names.len() != args.len() {
            return Err(self.fail(
                call_info,
                &Error::undefined_argument(name, function.param_names.len(), args.len()),
            ));
        }

        self.call_stack.push(name, shell);
        self.vars.push_function();

        let mut bind_error = None;
        for (param, arg) in function.param_names.iter().zip(args) {
            if let Err(err) = self.vars.set(VarScope::Function, "", param.clone(), arg.clone()) {
                bind_error = Some(err);
                break;
            }
        }
        if bind_error.is_none() {
            if let Err(err) = self
                .vars
                .set(VarScope::Function, "", "FUNCTION_SHELL", shell.to_string())
            {
                bind_error = Some(err);
            }
        }

        let result = if let Some(err) = bind_error {
            self.fail(call_info, &err)
        } else {
            self.run_lines(&function.body)
        };

        self.vars.pop_function();
        self.call_stack.pop();

        if result.is_ok() { Ok(()) } else { Err(result) }
    }

    fn dispatch_include(&mut self, info: &SourceInfo, path: &str) -> Result<(), ScriptResult> {
        let dir = self
            .script_frames
            .last()
            .map(|f| f.dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        let env = self.script_frames.last().map(|f| f.env.clone()).unwrap_or_default();
        let resolved = dir.join(path);

        let script = self
            .loader
            .load_file(&resolved, env)
            .map_err(|err| self.fail(info, &err))?;

        let result = self.run(&script);
        if result.is_ok() { Ok(()) } else { Err(result) }
    }

    fn poll_and_feed(&mut self, remaining_ms: u64) -> Result<bool, Error> {
        loop {
            let names: Vec<String> = self.shells.keys().cloned().collect();
            if names.is_empty() {
                return Ok(false);
            }

            let outcome = {
                let fds: Vec<BorrowedFd<'_>> = self.shells.values().map(|p| p.fd_input()).collect();
                poll_ready(&fds, Duration::from_millis(remaining_ms))?
            };

            match outcome {
                PollOutcome::TimedOut => return Ok(false),
                PollOutcome::Interrupted => {
                    self.reap_children_nonblocking();
                    if signal::stop_requested() {
                        return Err(Error::shell("", "run interrupted by signal"));
                    }
                    continue;
                }
                PollOutcome::Ready(idxs) => {
                    for idx in idxs {
                        self.read_one(&names[idx])?;
                    }
                    return Ok(true);
                }
            }
        }
    }

    fn reap_children_nonblocking(&mut self) {
        while signal::take_child_exited() {
            loop {
                match nix::sys::wait::waitpid(None, Some(nix::sys::wait::WaitPidFlag::WNOHANG)) {
                    Ok(nix::sys::wait::WaitStatus::StillAlive) => break,
                    Ok(status) => {
                        let Some(pid) = status.pid() else { break };
                        let code = exit_code_of(&status);
                        if let Some(process) = self.shells.values_mut().find(|p| p.pid() == pid) {
                            process.set_alive(false, code);
                        }
                    }
                    Err(_) => break,
                }
            }
        }
    }

    fn read_one(&mut self, name: &str) -> Result<(), Error> {
        let mut buf = [0u8; 4096];
        let Some(process) = self.shells.get_mut(name) else {
            return Ok(());
        };
        let fd = process.fd_input();
        match nix::unistd::read(fd, &mut buf) {
            Ok(0) | Err(nix::Error::EAGAIN) => Ok(()),
            Ok(n) => {
                process.on_output(&buf[..n])?;
                if let Some(log) = self.shell_logs.get_mut(name) {
                    log.output(&buf[..n]);
                }
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn write_all_best_effort(process: &mut dyn Process, data: &[u8]) -> Result<(), Error> {
    let mut attempts = 0u32;
    loop {
        if process.write(data)? {
            return Ok(());
        }
        attempts += 1;
        if attempts > 200 {
            return Err(Error::shell("", "write did not drain after repeated attempts"));
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

type MatchGroups = Vec<String>;

/// Scans completed lines first, then the partial tail, dropping whatever
/// was consumed on success.
fn run_match(
    process: &mut dyn Process,
    mut test: impl FnMut(&str, bool) -> Result<Option<MatchGroups>, Error>,
) -> Result<(LineStatus, MatchGroups), Error> {
    let lines: Vec<String> = process.lines().to_vec();
    for (idx, candidate) in lines.iter().enumerate() {
        if let Some(groups) = test(candidate, false)? {
            process.consume_until(idx + 1);
            return Ok((LineStatus::Ok, groups));
        }
    }

    let buf = process.buf().to_string();
    if let Some(groups) = test(&buf, true)? {
        process.consume_until(lines.len());
        process.consume_buf();
        return Ok((LineStatus::Ok, groups));
    }

    Ok((LineStatus::NoMatch, MatchGroups::new()))
}

fn exit_code_of(status: &nix::sys::wait::WaitStatus) -> i32 {
    match status {
        nix::sys::wait::WaitStatus::Exited(_, code) => *code,
        nix::sys::wait::WaitStatus::Signaled(_, signal, _) => 128 + (*signal as i32),
        _ => -1,
    }
}
