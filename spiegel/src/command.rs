use std::fmt;
use std::sync::Arc;

use crate::{DispatchError, Invoker, ObjectRef, Value};

/// Prefix joining a member name to its can-execute companion.
const CAN_PREFIX: &str = "Can";

/// A named operation bound to a receiver, with an optional can-execute
/// predicate that may live on a different receiver.
///
/// Execute and can-execute are independent: invoking execute never
/// consults the predicate. The owner handles are shared, not owned; a
/// command does not control its owner's lifetime.
pub struct Command {
    invoker: Invoker,
    owner: Value,
    name: Arc<str>,
    can_owner: Option<Value>,
    can_name: Option<Arc<str>>,
}

impl Command {
    /// Command with an always-true can-execute.
    pub fn new(invoker: Invoker, owner: Value, name: &str) -> Self {
        Self {
            invoker,
            owner,
            name: Arc::from(name),
            can_owner: None,
            can_name: None,
        }
    }

    /// Command with a bound can-execute member.
    pub fn with_can_execute(
        invoker: Invoker,
        owner: Value,
        name: &str,
        can_owner: Value,
        can_name: &str,
    ) -> Self {
        Self {
            invoker,
            owner,
            name: Arc::from(name),
            can_owner: Some(can_owner),
            can_name: Some(Arc::from(can_name)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_can_execute_bound(&self) -> bool {
        self.can_name.is_some()
    }

    /// Invoke the target member for effect.
    pub fn execute(&self, parameter: Value) -> Result<(), DispatchError> {
        self.invoker.invoke_member_action(
            &self.owner,
            &self.name,
            &[parameter],
        )
    }

    /// Evaluate the can-execute predicate, coercing its result to bool.
    ///
    /// Unbound commands report `true` without touching any member; only a
    /// bound member that itself fails produces an error.
    pub fn can_execute(
        &self,
        parameter: Value,
    ) -> Result<bool, DispatchError> {
        match (&self.can_owner, &self.can_name) {
            (Some(owner), Some(name)) => {
                let verdict = self.invoker.invoke_member(
                    owner,
                    name,
                    &[parameter],
                )?;
                Ok(verdict.is_truthy())
            }
            _ => Ok(true),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("can_execute", &self.can_name)
            .finish()
    }
}

/// Lazy, name-keyed command cache over a base object.
///
/// The first lookup of a name decides, once, whether a `Can<Name>`
/// companion exists: either as a data entry in the owner's container or
/// as a method declared by the owner's runtime tag. The constructed
/// [`Command`] is stored in the trampoline's own container; later lookups
/// return the identical command without re-deciding, even if the owner
/// gains a companion afterwards.
///
/// Scoped to a single owning object; not designed for concurrent
/// mutation from multiple threads.
pub struct Trampoline {
    invoker: Invoker,
    owner: Value,
    commands: ObjectRef,
}

impl Trampoline {
    pub fn new(invoker: Invoker, owner: Value) -> Self {
        Self {
            invoker,
            owner,
            commands: ObjectRef::default(),
        }
    }

    pub fn owner(&self) -> &Value {
        &self.owner
    }

    /// Fetch the command for `name`, constructing and caching it on first
    /// access.
    pub fn command(&self, name: &str) -> Arc<Command> {
        if let Some(Value::Native(cached)) = self.commands.peek(name) {
            if let Ok(command) = cached.downcast::<Command>() {
                return command;
            }
        }

        let can_name = format!("{CAN_PREFIX}{name}");
        let command = Arc::new(if self.declares(&can_name) {
            log::debug!("binding `{name}` with can-execute `{can_name}`");
            Command::with_can_execute(
                self.invoker.clone(),
                self.owner.clone(),
                name,
                self.owner.clone(),
                &can_name,
            )
        } else {
            log::debug!("binding `{name}` without can-execute");
            Command::new(self.invoker.clone(), self.owner.clone(), name)
        });

        self.commands.set(name, Value::Native(command.clone()));
        command
    }

    /// A data entry in the owner's container counts, as does a method
    /// declared for the owner's runtime tag.
    fn declares(&self, can_name: &str) -> bool {
        if let Value::Object(container) = &self.owner {
            if container.contains(can_name) {
                return true;
            }
        }
        self.invoker
            .registry()
            .has_method(self.owner.type_tag(), can_name)
    }
}

impl fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trampoline")
            .field("owner", &self.owner.type_tag().name())
            .field("commands", &self.commands.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{expect_int, expect_native};
    use crate::registry::{ParamSpec, ParamType};
    use crate::FunctionValue;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Tally {
        total: Mutex<i64>,
    }

    fn tally_invoker() -> Invoker {
        let invoker = Invoker::new();
        invoker.registry().register_native::<Tally, _>("tally", |spec| {
            spec.action(
                "Increment",
                vec![ParamSpec::input(ParamType::Int)],
                |recv, args| {
                    let tally = expect_native::<Tally>(recv)?;
                    *tally.total.lock() += expect_int(&args[0])?;
                    Ok(Value::Null)
                },
            );
        });
        invoker
    }

    #[test]
    fn unbound_can_execute_is_always_true() {
        let invoker = tally_invoker();
        let owner = Value::native(Tally {
            total: Mutex::new(0),
        });
        let trampoline = Trampoline::new(invoker.clone(), owner.clone());

        let command = trampoline.command("Increment");
        assert!(!command.is_can_execute_bound());
        assert!(command.can_execute(Value::Int(5)).unwrap());

        command.execute(Value::Int(5)).unwrap();
        let total = *owner.as_native::<Tally>().unwrap().total.lock();
        assert_eq!(total, 5);
    }

    #[test]
    fn bound_can_execute_via_container_entry() {
        let invoker = tally_invoker();
        let owner = Value::object();
        let saved = Arc::new(AtomicBool::new(false));
        let saved_probe = saved.clone();
        invoker
            .invoke_set(
                &owner,
                "Save",
                Value::function(FunctionValue::action(
                    vec![ParamSpec::input(ParamType::Any)],
                    move |_| {
                        saved_probe.store(true, Ordering::Relaxed);
                        Ok(Value::Null)
                    },
                )),
            )
            .unwrap();
        invoker
            .invoke_set(
                &owner,
                "CanSave",
                Value::function(FunctionValue::new(
                    vec![ParamSpec::input(ParamType::Any)],
                    |_| Ok(Value::Bool(false)),
                )),
            )
            .unwrap();

        let trampoline = Trampoline::new(invoker, owner);
        let command = trampoline.command("Save");
        assert!(command.is_can_execute_bound());
        assert!(!command.can_execute(Value::Null).unwrap());

        // Can-execute does not gate execute.
        command.execute(Value::Null).unwrap();
        assert!(saved.load(Ordering::Relaxed));
    }

    #[test]
    fn bound_can_execute_via_declared_method() {
        let invoker = tally_invoker();
        invoker.registry().extend(
            crate::TypeTag::of::<Tally>(),
            |spec| {
                spec.method(
                    "CanIncrement",
                    vec![ParamSpec::input(ParamType::Int)],
                    |recv, args| {
                        let tally = expect_native::<Tally>(recv)?;
                        let total = *tally.total.lock();
                        Ok(Value::Bool(total + expect_int(&args[0])? <= 10))
                    },
                );
            },
        );

        let owner = Value::native(Tally {
            total: Mutex::new(8),
        });
        let trampoline = Trampoline::new(invoker, owner);
        let command = trampoline.command("Increment");
        assert!(command.is_can_execute_bound());
        assert!(command.can_execute(Value::Int(2)).unwrap());
        assert!(!command.can_execute(Value::Int(3)).unwrap());
    }

    #[test]
    fn lookup_is_idempotent() {
        let invoker = tally_invoker();
        let owner = Value::native(Tally {
            total: Mutex::new(0),
        });
        let trampoline = Trampoline::new(invoker, owner);

        let first = trampoline.command("Increment");
        let second = trampoline.command("Increment");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn no_retroactive_can_execute_pickup() {
        let invoker = tally_invoker();
        let owner = Value::object();
        invoker
            .invoke_set(
                &owner,
                "Refresh",
                Value::function(FunctionValue::action(
                    vec![ParamSpec::input(ParamType::Any)],
                    |_| Ok(Value::Null),
                )),
            )
            .unwrap();

        let trampoline = Trampoline::new(invoker.clone(), owner.clone());
        let before = trampoline.command("Refresh");
        assert!(!before.is_can_execute_bound());

        // The companion appears after the command was cached.
        invoker
            .invoke_set(
                &owner,
                "CanRefresh",
                Value::function(FunctionValue::new(
                    vec![ParamSpec::input(ParamType::Any)],
                    |_| Ok(Value::Bool(false)),
                )),
            )
            .unwrap();

        let after = trampoline.command("Refresh");
        assert!(Arc::ptr_eq(&before, &after));
        assert!(after.can_execute(Value::Null).unwrap());
    }

    #[test]
    fn truthiness_coercion_of_can_execute() {
        let invoker = tally_invoker();
        let owner = Value::object();
        invoker
            .invoke_set(
                &owner,
                "Go",
                Value::function(FunctionValue::action(
                    vec![ParamSpec::input(ParamType::Any)],
                    |_| Ok(Value::Null),
                )),
            )
            .unwrap();
        // A can-execute returning a non-bool value coerces by truthiness.
        invoker
            .invoke_set(
                &owner,
                "CanGo",
                Value::function(FunctionValue::new(
                    vec![ParamSpec::input(ParamType::Any)],
                    |_| Ok(Value::Null),
                )),
            )
            .unwrap();

        let trampoline = Trampoline::new(invoker, owner);
        let command = trampoline.command("Go");
        assert!(!command.can_execute(Value::Null).unwrap());
    }
}
