//! Plain-text help built from resolved data.
//!
//! Nothing here feeds back into parsing: panels are derived from the same
//! resolved parameters and registered entries the binder uses, and then
//! rendered in aligned columns.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::app::{App, resolve_in};
use crate::command::ParamKind;
use crate::error::Result;
use crate::group::{Group, GroupRef, GroupRegistry, same_group};
use crate::resolve::ResolvedParameter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpEntry {
    /// Display names, short spellings first.
    pub names: Vec<String>,
    pub description: String,
    pub required: bool,
}

impl HelpEntry {
    fn sort_name(&self) -> &str {
        self.names
            .iter()
            .find(|n| !is_short(n))
            .or_else(|| self.names.first())
            .map_or("", String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct HelpPanel {
    pub group: Arc<Group>,
    pub entries: Vec<HelpEntry>,
}

impl HelpPanel {
    pub fn title(&self) -> &str {
        &self.group.name
    }
}

/// Command listing of the last app in `apps`.
///
/// A meta app describing its wrapped app also lists the wrapped app's
/// commands (its builtin flags are already the meta app's own).
pub fn command_panels(apps: &[&App], wrapped: Option<&App>) -> Vec<HelpPanel> {
    let Some(target) = apps.last() else {
        return Vec::new();
    };
    let mut registry = GroupRegistry::default();
    registry.register(&target.group_commands);

    let mut panels: Vec<HelpPanel> = Vec::new();
    let sources = std::iter::once((*target, true)).chain(wrapped.map(|w| (w, false)));
    for (app, include_builtins) in sources {
        for (names, entry) in app.entries() {
            if !entry.show || (!include_builtins && entry.builtin().is_some()) {
                continue;
            }
            let group = match &entry.group {
                Some(reference) => registry.resolve(reference),
                None => registry.resolve(&GroupRef::Group(Arc::clone(&app.group_commands))),
            };
            let item = HelpEntry {
                names: order_names(names.iter().map(|n| n.to_string())),
                description: first_line(&entry.help),
                required: false,
            };
            push_entry(&mut panels, group, item);
        }
    }

    for panel in &mut panels {
        panel.entries.sort_by(|a, b| {
            let (a, b) = (a.sort_name(), b.sort_name());
            (a.starts_with('-'), a).cmp(&(b.starts_with('-'), b))
        });
    }
    panels
}

/// Parameter panels of the last app's default command, in group
/// first-occurrence order.
pub fn parameter_panels(apps: &[&App], wrapped: Option<&App>) -> Result<Vec<HelpPanel>> {
    let mut panels: Vec<HelpPanel> = Vec::new();
    let mut chains: Vec<Vec<&App>> = vec![apps.to_vec()];
    if let Some(inner) = wrapped {
        chains.push(vec![inner]);
    }
    for chain in chains {
        let Some(command) = chain.last().and_then(|app| app.default_target()) else {
            continue;
        };
        let resolved = resolve_in(&chain, command)?;
        for (group, members) in &resolved.groups {
            for &idx in members {
                let param = &resolved.parameters[idx];
                if param.show {
                    push_entry(&mut panels, Arc::clone(group), parameter_entry(param));
                }
            }
        }
    }
    Ok(panels)
}

/// Every visible panel, ordered for display.
///
/// Groups with a sort key come first in ascending key order; the rest
/// follow alphabetically. A group holding both parameters and commands
/// lists the parameters first.
pub fn panels(apps: &[&App], wrapped: Option<&App>) -> Result<Vec<HelpPanel>> {
    let mut out = parameter_panels(apps, wrapped)?;
    for panel in command_panels(apps, wrapped) {
        for entry in panel.entries {
            push_entry(&mut out, Arc::clone(&panel.group), entry);
        }
    }
    out.retain(|p| p.group.show && !p.entries.is_empty());
    out.sort_by(|a, b| compare_groups(&a.group, &b.group));
    Ok(out)
}

fn compare_groups(a: &Group, b: &Group) -> Ordering {
    match (a.sort_value(), b.sort_value()) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.name.cmp(&b.name)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.name.cmp(&b.name),
    }
}

pub fn usage(apps: &[&App]) -> String {
    let path: Vec<&str> = apps.iter().map(|a| a.name.as_str()).collect();
    let mut out = format!("Usage: {}", path.join(" "));
    let Some(target) = apps.last() else {
        return out;
    };
    if target
        .entries()
        .iter()
        .any(|(_, e)| e.builtin().is_none() && e.show)
    {
        out.push_str(" COMMAND");
    }
    if let Some(command) = target.default_target() {
        let params = &command.params;
        if params
            .iter()
            .any(|p| p.kind.accepts_positional() || p.kind == ParamKind::VarPositional)
        {
            out.push_str(" [ARGS]");
        }
        if params
            .iter()
            .any(|p| !matches!(p.kind, ParamKind::PositionalOnly | ParamKind::VarPositional))
        {
            out.push_str(" [OPTIONS]");
        }
    }
    out
}

/// Render the help screen for the routed chain.
pub fn render(apps: &[&App], wrapped: Option<&App>) -> Result<String> {
    let mut out = usage(apps);
    out.push('\n');

    let description = apps
        .last()
        .map(|a| {
            a.default_target()
                .map(|c| c.help.trim())
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| a.help.trim())
        })
        .unwrap_or_default();
    if !description.is_empty() {
        out.push('\n');
        out.push_str(description);
        out.push('\n');
    }

    for panel in panels(apps, wrapped)? {
        out.push_str(&format!("\n{}:\n", panel.title()));
        if !panel.group.help.trim().is_empty() {
            out.push_str(&format!("  {}\n", panel.group.help.trim()));
        }
        let rows: Vec<(String, &str)> = panel
            .entries
            .iter()
            .map(|e| (e.names.join(", "), e.description.as_str()))
            .collect();
        let width = rows.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
        for (left, help) in rows {
            if help.is_empty() {
                out.push_str(&format!("  {}\n", left));
            } else {
                out.push_str(&format!("  {:width$}  {}\n", left, help, width = width));
            }
        }
    }
    Ok(out)
}

fn parameter_entry(param: &ResolvedParameter) -> HelpEntry {
    let mut names: Vec<String> = Vec::new();
    if param.option_names().next().is_none() {
        names.push(param.display_name());
    } else if param.is_positional() {
        names.push(param.field.to_uppercase());
    }
    names.extend(param.option_names().map(str::to_string));
    names.extend(param.negatives.iter().cloned());
    names.dedup();

    let mut description = param.help.trim().to_string();
    let mut annotate = |text: String| {
        if !description.is_empty() {
            description.push(' ');
        }
        description.push_str(&text);
    };
    if param.show_choices {
        let choices = param.shape.choices();
        if !choices.is_empty() {
            annotate(format!("[choices: {}]", choices.join(", ")));
        }
    }
    if !param.env_vars.is_empty() {
        annotate(format!("[env var: {}]", param.env_vars.join(", ")));
    }
    if let (true, Some(default)) = (param.show_default, &param.default) {
        let shown = default.to_string();
        if !shown.is_empty() {
            annotate(format!("[default: {shown}]"));
        }
    }
    if param.required {
        annotate("[required]".to_string());
    }

    HelpEntry {
        names: order_names(names),
        description,
        required: param.required,
    }
}

fn push_entry(panels: &mut Vec<HelpPanel>, group: Arc<Group>, entry: HelpEntry) {
    match panels.iter_mut().find(|p| same_group(&p.group, &group)) {
        Some(panel) => panel.entries.push(entry),
        None => panels.push(HelpPanel {
            group,
            entries: vec![entry],
        }),
    }
}

fn is_short(name: &str) -> bool {
    name.len() == 2 && name.starts_with('-') && !name.starts_with("--")
}

/// Short spellings first, otherwise in declaration order.
fn order_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let (short, long): (Vec<String>, Vec<String>) = names.into_iter().partition(|n| is_short(n));
    short.into_iter().chain(long).collect()
}

fn first_line(text: &str) -> String {
    text.trim().lines().next().unwrap_or_default().trim().to_string()
}
