//! Explicit table of controllers and their actions.
//!
//! Controllers are registered under their type name (`user-profile` ->
//! `UserProfileController`) and actions under their method name (`view` ->
//! `actionView`), so the router can resolve URL tokens the same way.

use std::collections::HashMap;
use std::sync::Arc;

use super::Controller;
use crate::fault::Fault;
use crate::router::ActionParams;

/// An action body.
pub type Action = Arc<dyn Fn(&mut Controller, &ActionParams) -> Result<(), Fault> + Send + Sync>;

pub const CONTROLLER_SUFFIX: &str = "Controller";
pub const ACTION_PREFIX: &str = "action";

/// Replace `-` with spaces, upper-case the first letter of every word and
/// drop the spaces: `user-profile` -> `UserProfile`.
pub fn normalize_name(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut word_start = true;
    for c in token.chars() {
        let c = if c == '-' { ' ' } else { c };
        if matches!(c, ' ' | '\t' | '\r' | '\n' | '\x0b' | '\x0c') {
            if c != ' ' {
                out.push(c);
            }
            word_start = true;
        } else if word_start {
            out.push(c.to_ascii_uppercase());
            word_start = false;
        } else {
            out.push(c);
        }
    }
    out
}

pub fn controller_type_name(token: &str) -> String {
    format!("{}{}", normalize_name(token), CONTROLLER_SUFFIX)
}

pub fn action_method_name(token: &str) -> String {
    format!("{}{}", ACTION_PREFIX, normalize_name(token))
}

/// One controller: its per-controller view settings and actions.
#[derive(Clone)]
pub struct ControllerDescriptor {
    type_name: String,
    pub layout: Option<String>,
    pub theme: Option<String>,
    pub title: Option<String>,
    actions: HashMap<String, Action>,
}

impl ControllerDescriptor {
    /// A controller reached through the URL token `token`.
    pub fn new(token: &str) -> Self {
        Self {
            type_name: controller_type_name(token),
            layout: None,
            theme: None,
            title: None,
            actions: HashMap::new(),
        }
    }

    pub fn layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    pub fn theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Register an action reached through the URL token `token`.
    pub fn action<F>(mut self, token: &str, action: F) -> Self
    where
        F: Fn(&mut Controller, &ActionParams) -> Result<(), Fault> + Send + Sync + 'static,
    {
        self.actions.insert(action_method_name(token), Arc::new(action));
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn find_action(&self, method_name: &str) -> Option<&Action> {
        self.actions.get(method_name)
    }

    /// Action method names, sorted.
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ControllerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerDescriptor")
            .field("type_name", &self.type_name)
            .field("layout", &self.layout)
            .field("theme", &self.theme)
            .field("actions", &self.action_names())
            .finish()
    }
}

/// Every controller the application knows.
#[derive(Debug, Clone, Default)]
pub struct ControllerRegistry {
    controllers: HashMap<String, ControllerDescriptor>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a controller, replacing one with the same type name.
    pub fn register(mut self, descriptor: ControllerDescriptor) -> Self {
        self.controllers
            .insert(descriptor.type_name.clone(), descriptor);
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&ControllerDescriptor> {
        self.controllers.get(type_name)
    }

    /// Look up a controller and one of its actions by their full names.
    pub fn resolve(
        &self,
        type_name: &str,
        method_name: &str,
    ) -> Option<(&ControllerDescriptor, &Action)> {
        let descriptor = self.controllers.get(type_name)?;
        let action = descriptor.find_action(method_name)?;
        Some((descriptor, action))
    }

    /// Controller type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.controllers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("user-profile"), "UserProfile");
        assert_eq!(normalize_name("user"), "User");
        assert_eq!(normalize_name("already-Camel-case"), "AlreadyCamelCase");
        assert_eq!(normalize_name("snake_case"), "Snake_case");
        assert_eq!(normalize_name("two words"), "TwoWords");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn test_type_and_method_names() {
        assert_eq!(controller_type_name("user"), "UserController");
        assert_eq!(action_method_name("view"), "actionView");
        assert_eq!(action_method_name("list-all"), "actionListAll");
    }

    #[test]
    fn test_registry_resolve() {
        let registry = ControllerRegistry::new().register(
            ControllerDescriptor::new("user")
                .layout("layouts/admin")
                .action("view", |_, _| Ok(()))
                .action("list-all", |_, _| Ok(())),
        );

        assert!(registry.resolve("UserController", "actionView").is_some());
        assert!(registry.resolve("UserController", "actionListAll").is_some());
        assert!(registry.resolve("UserController", "actionDelete").is_none());
        assert!(registry.resolve("SiteController", "actionView").is_none());

        let descriptor = registry.get("UserController").unwrap();
        assert_eq!(descriptor.layout.as_deref(), Some("layouts/admin"));
        assert_eq!(descriptor.action_names(), vec!["actionListAll", "actionView"]);
    }
}
