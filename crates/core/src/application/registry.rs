//! Command Registry - startup-loaded whitelist of notification actions
//!
//! Built once from `[[commands]]` and immutable afterwards. Construction
//! fails if any executable is missing, so an invalid whitelist never reaches
//! runtime.

use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

use crate::domain::{CommandArgs, CommandDefinition, NotificationAction};
use crate::error::{ConfigError, ValidationError};
use crate::settings::{ActionCommands, CommandSpec};

#[derive(Debug)]
pub struct CommandRegistry {
    commands: Vec<CommandDefinition>,
    index: HashMap<String, usize>,
}

impl CommandRegistry {
    /// Build the registry from definitions, checking every executable exists
    pub fn new(definitions: Vec<CommandDefinition>) -> Result<Self, ConfigError> {
        let mut index = HashMap::with_capacity(definitions.len());
        for (position, def) in definitions.iter().enumerate() {
            if def.name.trim().is_empty() {
                return Err(ConfigError::MissingKey("commands.name".to_string()));
            }
            if !def.executable.is_file() {
                return Err(ConfigError::MissingExecutable {
                    command: def.name.clone(),
                    path: def.executable.display().to_string(),
                });
            }
            if index.insert(def.name.clone(), position).is_some() {
                return Err(ConfigError::DuplicateCommand(def.name.clone()));
            }
            debug!(command = %def.name, executable = %def.executable.display(), "Command registered");
        }
        Ok(Self {
            commands: definitions,
            index,
        })
    }

    /// Build from `[[commands]]` entries (paths already expanded by the loader)
    pub fn from_specs(specs: &[CommandSpec], default_timeout_secs: u64) -> Result<Self, ConfigError> {
        let definitions = specs
            .iter()
            .map(|spec| CommandDefinition {
                name: spec.name.clone(),
                executable: PathBuf::from(&spec.executable),
                args: spec.args.clone(),
                description: spec.description.clone(),
                default_timeout_secs: spec.timeout_secs.unwrap_or(default_timeout_secs),
                args_schema: spec.args_schema.clone(),
            })
            .collect();
        Self::new(definitions)
    }

    pub fn get(&self, name: &str) -> Option<&CommandDefinition> {
        self.index.get(name).map(|&i| &self.commands[i])
    }

    /// Definitions in configuration order
    pub fn list(&self) -> &[CommandDefinition] {
        &self.commands
    }

    pub fn is_valid(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Resolve a command and check the caller's arguments against its schema
    pub fn validate_args(
        &self,
        name: &str,
        args: &CommandArgs,
    ) -> Result<&CommandDefinition, ValidationError> {
        let def = self
            .get(name)
            .ok_or_else(|| ValidationError::UnknownCommand(name.to_string()))?;
        def.check_args(args)
            .map_err(|reason| ValidationError::InvalidArguments {
                command: name.to_string(),
                reason,
            })?;
        Ok(def)
    }

    /// Every monitor action must map to a registered command
    pub fn check_actions(&self, actions: &ActionCommands) -> Result<(), ConfigError> {
        for action in NotificationAction::ALL {
            let command = actions.command_for(action);
            if !self.is_valid(command) {
                return Err(ConfigError::UnknownAction {
                    action: action.to_string(),
                    command: command.to_string(),
                });
            }
        }
        Ok(())
    }
}
