//! Variable commands: Set, SetEval, SetMacro, Show, Unset.

use mos_types::error::{MosError, Result};

use crate::interpreter::{Args, Command, CommandRegistry, Environment};
use crate::variables::{VarValue, assign, escape, evaluate, gs_trans, value_text};

/// Variable name and the non-empty value text after it.
fn name_and_value<'l>(args: &mut Args<'l>) -> Result<(&'l str, &'l str)> {
    let name = args.next_token().ok_or(MosError::InvalidParameter)?;
    let value = args.rest_trimmed();
    if value.is_empty() {
        return Err(MosError::InvalidParameter);
    }
    Ok((name, value))
}

pub(crate) struct SetCmd;
impl Command for SetCmd {
    fn name(&self) -> &str {
        "SET"
    }
    fn execute(&self, args: &mut Args<'_>, shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let (name, text) = name_and_value(args)?;
        let value = gs_trans(&shell.variables(), env, text)?;
        assign(&mut shell.variables_mut(), env, name, VarValue::String(value))
    }
}

pub(crate) struct SetEvalCmd;
impl Command for SetEvalCmd {
    fn name(&self) -> &str {
        "SETEVAL"
    }
    fn execute(&self, args: &mut Args<'_>, shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let (name, expr) = name_and_value(args)?;
        let value = evaluate(&shell.variables(), env, expr)?;
        assign(&mut shell.variables_mut(), env, name, value)
    }
}

pub(crate) struct SetMacroCmd;
impl Command for SetMacroCmd {
    fn name(&self) -> &str {
        "SETMACRO"
    }
    fn execute(&self, args: &mut Args<'_>, shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let (name, template) = name_and_value(args)?;
        assign(
            &mut shell.variables_mut(),
            env,
            name,
            VarValue::Macro(template.to_string()),
        )
    }
}

// ---------------------------------------------------------------------------
// show / unset
// ---------------------------------------------------------------------------

pub(crate) struct ShowCmd;
impl Command for ShowCmd {
    fn name(&self) -> &str {
        "SHOW"
    }
    fn execute(&self, args: &mut Args<'_>, shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let pattern = args.next_token().unwrap_or("*");
        let store = shell.variables();
        let mut out = String::new();
        let mut after: Option<&str> = None;
        while let Some(var) = store.find(pattern, after) {
            let label = &var.label;
            match &var.value {
                VarValue::Macro(template) => {
                    out.push_str(&format!("{label}(Macro) : {}\r\n", escape(template)));
                },
                VarValue::Number(n) => out.push_str(&format!("{label}(Number) : {n}\r\n")),
                value @ VarValue::Code(_) => match value_text(&store, env, value) {
                    Ok(text) => out.push_str(&format!("{label} : {text}\r\n")),
                    Err(_) => {
                        out.push_str(&format!("{label} : Error fetching code-based variable\r\n"))
                    },
                },
                VarValue::String(s) => out.push_str(&format!("{label} : {}\r\n", escape(s))),
            }
            after = Some(label.as_str());
        }
        drop(store);
        env.print(&out);
        Ok(())
    }
}

pub(crate) struct UnsetCmd;
impl Command for UnsetCmd {
    fn name(&self) -> &str {
        "UNSET"
    }
    fn execute(&self, args: &mut Args<'_>, shell: &CommandRegistry, _env: &mut Environment<'_>) -> Result<()> {
        let pattern = args.next_token().ok_or(MosError::InvalidParameter)?;
        let mut store = shell.variables_mut();
        let doomed: Vec<String> = store
            .iter()
            .filter(|v| !matches!(v.value, VarValue::Code(_)))
            .filter(|v| mos_vfs::glob::matches(pattern, &v.label))
            .map(|v| v.label.clone())
            .collect();
        for label in doomed {
            log::debug!("unset {label}");
            store.remove(&label);
        }
        Ok(())
    }
}
