//! Slash-command parsing and dispatch: `"/name arg…"` becomes a rendered
//! user message, with an optional pre-script run in the sandbox first and
//! a minimum-capability check gating dispatch.

use agentrt_domain::{Error, LlmCapabilities, Result, Sandbox};
use std::collections::HashMap;

/// A capability a command requires of the provider it's dispatched
/// against. Checked before the pre-script runs; a missing capability
/// fails the dispatch synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredCapability {
    ToolCalling,
    Vision,
    Audio,
    Video,
    Reasoning,
    JsonMode,
    Streaming,
}

impl RequiredCapability {
    fn satisfied_by(self, caps: &LlmCapabilities) -> bool {
        match self {
            RequiredCapability::ToolCalling => caps.tool_calling,
            RequiredCapability::Vision => caps.vision,
            RequiredCapability::Audio => caps.audio,
            RequiredCapability::Video => caps.video,
            RequiredCapability::Reasoning => caps.reasoning,
            RequiredCapability::JsonMode => caps.json_mode,
            RequiredCapability::Streaming => caps.streaming,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandDefinition {
    pub name: String,
    /// Markdown template with `{UPPER_KEY}` placeholders.
    pub template: String,
    pub pre_script: Option<String>,
    pub min_capabilities: Vec<RequiredCapability>,
}

/// Parse `"/name arg one two"` into `(name, {"argument": "arg one two"})`.
/// Returns `None` if the line doesn't start with `/` or names nothing.
pub fn parse_command(line: &str) -> Option<(String, HashMap<String, String>)> {
    let rest = line.strip_prefix('/')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next()?.trim();
    if name.is_empty() {
        return None;
    }
    let argument = parts.next().unwrap_or("").trim().to_string();

    let mut args = HashMap::new();
    args.insert("argument".to_string(), argument);
    Some((name.to_string(), args))
}

/// Replace every `{UPPER_KEY}` placeholder in `template` with the
/// corresponding value from `args`. Placeholders with no matching arg are
/// left verbatim so a malformed command definition fails loudly at use
/// time rather than silently blanking content.
pub fn render_template(template: &str, args: &HashMap<String, String>) -> String {
    let mut rendered = template.to_string();
    for (key, value) in args {
        let placeholder = format!("{{{}}}", key.to_uppercase());
        rendered = rendered.replace(&placeholder, value);
    }
    rendered
}

pub struct CommandExecutor {
    commands: HashMap<String, CommandDefinition>,
}

impl CommandExecutor {
    pub fn new(commands: Vec<CommandDefinition>) -> Self {
        Self { commands: commands.into_iter().map(|c| (c.name.clone(), c)).collect() }
    }

    pub fn get(&self, name: &str) -> Option<&CommandDefinition> {
        self.commands.get(name)
    }

    /// Run a parsed command line: validate capabilities, run the
    /// pre-script (if any) in `sandbox`, and return the rendered user
    /// message text.
    pub async fn dispatch(&self, line: &str, caps: &LlmCapabilities, sandbox: &dyn Sandbox) -> Result<String> {
        let (name, args) = parse_command(line).ok_or_else(|| Error::Other(format!("not a command: {line}")))?;

        let command = self
            .commands
            .get(&name)
            .ok_or_else(|| Error::Config(format!("unknown command '{name}'")))?;

        if let Some(missing) = command.min_capabilities.iter().find(|c| !c.satisfied_by(caps)) {
            return Err(Error::Config(format!("command '{name}' requires {missing:?}, provider lacks it")));
        }

        if let Some(script) = &command.pre_script {
            let output = sandbox.exec(script, Default::default()).await?;
            if output.code != 0 {
                return Err(Error::Tool(format!(
                    "pre-script for command '{name}' exited with code {}",
                    output.code
                )));
            }
        }

        Ok(render_template(&command.template, &args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_argument() {
        let (name, args) = parse_command("/summarize the whole thread").unwrap();
        assert_eq!(name, "summarize");
        assert_eq!(args.get("argument").unwrap(), "the whole thread");
    }

    #[test]
    fn parses_name_with_no_argument() {
        let (name, args) = parse_command("/help").unwrap();
        assert_eq!(name, "help");
        assert_eq!(args.get("argument").unwrap(), "");
    }

    #[test]
    fn non_slash_line_is_not_a_command() {
        assert!(parse_command("hello there").is_none());
    }

    #[test]
    fn template_placeholder_is_replaced_case_insensitively_on_key() {
        let mut args = HashMap::new();
        args.insert("argument".to_string(), "draft one".to_string());
        let rendered = render_template("Please revise: {ARGUMENT}", &args);
        assert_eq!(rendered, "Please revise: draft one");
    }

    #[tokio::test]
    async fn missing_capability_fails_dispatch_without_running_pre_script() {
        struct PanicSandbox;
        #[async_trait::async_trait]
        impl Sandbox for PanicSandbox {
            async fn exec(&self, _cmd: &str, _opts: agentrt_domain::ExecOpts) -> Result<agentrt_domain::ExecOutput> {
                panic!("pre-script must not run when capability check fails");
            }
            async fn read(&self, _path: &str) -> Result<String> {
                unimplemented!()
            }
            async fn write(&self, _path: &str, _content: &str) -> Result<()> {
                unimplemented!()
            }
            async fn glob(&self, _pattern: &str, _opts: agentrt_domain::GlobOpts) -> Result<Vec<String>> {
                unimplemented!()
            }
            fn work_dir(&self) -> &str {
                "/tmp"
            }
            async fn dispose(&self) {}
        }

        let executor = CommandExecutor::new(vec![CommandDefinition {
            name: "vision-describe".into(),
            template: "Describe: {ARGUMENT}".into(),
            pre_script: Some("echo should-not-run".into()),
            min_capabilities: vec![RequiredCapability::Vision],
        }]);

        let caps = LlmCapabilities { vision: false, ..Default::default() };
        let result = executor.dispatch("/vision-describe cat.png", &caps, &PanicSandbox).await;
        assert!(result.is_err());
    }
}
