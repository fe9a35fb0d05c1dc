//! Munge generation from plugin and app manifests

use crate::plugin_info::{ConfigFileDecl, EditConfigDecl, PluginInfo};
use once_cell::sync::Lazy;
use plugmunge_state::{deep_add, Fragment, Munge, Variables, APP_CONFIG_OWNER};
use regex::{Captures, Regex};
use std::borrow::Cow;

static VARIABLE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").ok());

/// One declaration of the app manifest
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigChange<'a> {
    File(&'a ConfigFileDecl),
    Edit(&'a EditConfigDecl),
}

/// Replace `$NAME` with the value of `NAME`. Unknown names stay as written.
pub fn expand_variables<'a>(text: &'a str, vars: &Variables) -> Cow<'a, str> {
    let Some(pattern) = VARIABLE.as_ref() else {
        return Cow::Borrowed(text);
    };
    pattern.replace_all(text, |caps: &Captures<'_>| {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        caps.get(1)
            .and_then(|name| vars.get(name.as_str()))
            .map_or_else(|| whole.to_string(), Clone::clone)
    })
}

/// Munge of every config-file and edit-config child a plugin declares for
/// `platform`, one fragment per child node
pub fn generate_plugin_config_munge(info: &PluginInfo, platform: &str, vars: &Variables) -> Munge {
    let mut munge = Munge::default();

    for decl in info.config_files(platform) {
        for xml in &decl.xmls {
            let fragment = Fragment::new(expand_variables(xml, vars)).with_after(decl.after.clone());
            deep_add(&mut munge, &decl.target, &decl.parent, fragment);
        }
    }

    for edit in info.edit_configs(platform) {
        for xml in &edit.xmls {
            let fragment = Fragment::new(expand_variables(xml, vars))
                .with_mode(Some(edit.mode))
                .with_plugin(info.id.as_str());
            deep_add(&mut munge, &edit.file, &edit.target, fragment);
        }
    }

    munge
}

/// Munge of the app manifest's declarations, owned by `config.xml`
pub fn generate_config_xml_munge<'a>(changes: impl IntoIterator<Item = ConfigChange<'a>>) -> Munge {
    let mut munge = Munge::default();
    for change in changes {
        match change {
            ConfigChange::Edit(edit) => {
                for xml in &edit.xmls {
                    let fragment = Fragment::new(xml.as_str())
                        .with_mode(Some(edit.mode))
                        .with_id(APP_CONFIG_OWNER);
                    deep_add(&mut munge, &edit.file, &edit.target, fragment);
                }
            }
            ConfigChange::File(decl) => {
                for xml in &decl.xmls {
                    let fragment = Fragment::new(xml.as_str())
                        .with_after(decl.after.clone())
                        .with_id(APP_CONFIG_OWNER);
                    deep_add(&mut munge, &decl.target, &decl.parent, fragment);
                }
            }
        }
    }
    munge
}
