//! Unit tests for the analyzing engine.
//!
//! This module contains tests for the call-stack interpreter, verifying
//! correct behavior for:
//! - Call pushing and the taint short-circuit
//! - Taint monotonicity and propagation
//! - Scope provenance bookkeeping (starts, ends, temporaries)
//! - Dynamic-call queueing, draining, and relative ordering
//! - Method resolution (overrides, dynamic dispatch, caching)
//! - Global scope fallback and fatal lookups
//! - The edits-provider swap
//! - Execution limits and run determinism

use std::sync::Arc;

use crate::{
    analyzing::{
        AnalyzingContext, AnalyzingResult, DirectValue, InstanceId, InstanceInfo, Machine,
        MachineSettings, MethodId, RemoveProvider, VariableName,
    },
    program::{instructions, InstructionInfo},
    test::{
        add_method, arithmetic_registry, call_log, generator, logging_generator, native,
        OptionalArgs,
    },
    Error,
};

use super::{AnalysisLimits, CallTransform, MethodRegistry};

fn context_with(registry: Arc<MethodRegistry>) -> AnalyzingContext {
    AnalyzingContext::new(MachineSettings::default(), registry)
}

/// Steps the context to completion, panicking on any fatal error.
fn drive(context: &mut AnalyzingContext) {
    while let Some(instruction) = context.next_instruction().unwrap() {
        context.prepare(instruction.as_ref());
        instruction.execute(context).unwrap();
    }
}

/// Finds the unique direct instance holding `value`.
fn find_instance(result: &AnalyzingResult, value: &DirectValue) -> InstanceId {
    let mut matches = result
        .instances()
        .iter()
        .filter(|(_, instance)| instance.direct_value() == Some(value));
    let (id, _) = matches.next().expect("instance with value exists");
    assert!(matches.next().is_none(), "value {value} is not unique");
    id
}

// ================================================================
// Push protocol and the taint short-circuit
// ================================================================

#[test]
fn test_clean_call_pushes_frame() {
    let mut context = context_with(arithmetic_registry());
    let lhs = context.create_direct_instance(DirectValue::I32(2));
    let rhs = context.create_direct_instance(DirectValue::I32(3));

    context.invoke(add_method(), vec![lhs, rhs]).unwrap();

    assert_eq!(context.stack_depth(), 1);
    let frame = context.current_frame().unwrap();
    assert!(!frame.is_call_end());
    assert_eq!(frame.arguments(), &[lhs, rhs]);
    assert!(!context.is_dirty(lhs));
    assert!(!context.is_dirty(rhs));
}

#[test]
fn test_unresolved_call_taint_short_circuit() {
    let mut context = context_with(Arc::new(MethodRegistry::new()));
    let lhs = context.create_direct_instance(DirectValue::I32(2));
    let rhs = context.create_direct_instance(DirectValue::I32(3));

    context
        .invoke(MethodId::new("Foo", 2), vec![lhs, rhs])
        .unwrap();

    assert_eq!(context.stack_depth(), 0);
    assert!(context.is_dirty(lhs));
    assert!(context.is_dirty(rhs));
    assert!(context.is_dirty(context.last_return()));
    assert_ne!(context.last_return(), context.null_instance());
}

#[test]
fn test_each_taint_event_mints_a_fresh_dirty_return() {
    let mut context = context_with(Arc::new(MethodRegistry::new()));
    let argument = context.create_direct_instance(DirectValue::I32(1));

    context
        .invoke(MethodId::new("Foo", 1), vec![argument])
        .unwrap();
    let first = context.last_return();
    context
        .invoke(MethodId::new("Foo", 1), vec![argument])
        .unwrap();
    let second = context.last_return();

    assert_ne!(first, second);
    assert!(context.is_dirty(first));
    assert!(context.is_dirty(second));
}

#[test]
fn test_dirty_argument_skips_resolved_call() {
    let mut context = context_with(arithmetic_registry());
    let lhs = context.create_direct_instance(DirectValue::I32(2));
    let rhs = context.create_direct_instance(DirectValue::I32(3));
    context.mark_dirty(lhs);

    context.invoke(add_method(), vec![lhs, rhs]).unwrap();

    assert_eq!(context.stack_depth(), 0);
    assert!(context.is_dirty(rhs));
    assert!(context.is_dirty(context.last_return()));
}

#[test]
fn test_taint_is_monotonic_across_operations() {
    let mut context = context_with(arithmetic_registry());
    let value = context.create_direct_instance(DirectValue::I32(2));
    context.mark_dirty(value);

    let other = context.create_direct_instance(DirectValue::I32(3));
    context.invoke(add_method(), vec![value, other]).unwrap();
    drive(&mut context);

    assert!(context.is_dirty(value));
    assert!(context.is_dirty(other));
}

// ================================================================
// End-to-end runs
// ================================================================

#[test]
fn test_run_native_add() {
    let machine = Machine::default();
    let result = machine
        .run(
            arithmetic_registry(),
            &add_method(),
            &[DirectValue::I32(2), DirectValue::I32(3)],
        )
        .unwrap();

    assert_eq!(
        result.direct_value(result.last_return_value()),
        Some(&DirectValue::I32(5)),
    );
    assert!(!result.is_dirty(result.last_return_value()));
    let entry = result.entry_context().unwrap();
    assert_eq!(entry.method(), &add_method());
    assert!(entry.caller().is_none());
}

#[test]
fn test_nested_calls_flow_return_values() {
    let registry = arithmetic_registry();
    let main = MethodId::new("Main", 0);
    registry.register(
        main.clone(),
        generator(|emitter| {
            emitter.start_block("let x = Add(2, 3)");
            emitter.assign_literal("$a", DirectValue::I32(2));
            emitter.assign_literal("$b", DirectValue::I32(3));
            emitter.call(add_method(), vec!["$a".into(), "$b".into()]);
            emitter.assign_return_value("x");
            emitter.start_block("return Add(x, x)");
            emitter.call(add_method(), vec!["x".into(), "x".into()]);
            emitter.assign_return_value("y");
            emitter.ret("y");
            Ok(())
        }),
    );

    let machine = Machine::default();
    let result = machine.run(registry, &main, &[]).unwrap();

    assert_eq!(
        result.direct_value(result.last_return_value()),
        Some(&DirectValue::I32(10)),
    );
}

#[test]
fn test_run_determinism() {
    let run = || {
        let registry = arithmetic_registry();
        let main = MethodId::new("Main", 0);
        registry.register(
            main.clone(),
            generator(|emitter| {
                emitter.start_block("let x = Add(1, 2)");
                emitter.assign_literal("$a", DirectValue::I32(1));
                emitter.assign_literal("$b", DirectValue::I32(2));
                emitter.call(add_method(), vec!["$a".into(), "$b".into()]);
                emitter.assign_return_value("x");
                emitter.ret("x");
                Ok(())
            }),
        );
        Machine::default().run(registry, &main, &[]).unwrap()
    };

    let first = run();
    let second = run();

    assert_eq!(first.resolved_methods(), second.resolved_methods());
    assert_eq!(
        first.direct_value(first.last_return_value()),
        second.direct_value(second.last_return_value()),
    );
    assert_eq!(first.instructions_executed(), second.instructions_executed());
    assert_eq!(first.created_instances(), second.created_instances());
}

#[test]
fn test_empty_program_yields_frame_without_entry_block() {
    let registry = MethodRegistry::new();
    let empty = MethodId::new("Empty", 0);
    registry.register(empty.clone(), generator(|_emitter| Ok(())));

    let result = Machine::default()
        .run(Arc::new(registry), &empty, &[])
        .unwrap();

    let entry = result.entry_context().unwrap();
    assert!(entry.entry_block().is_none());
    assert_eq!(result.instructions_executed(), 0);
}

// ================================================================
// Scope provenance
// ================================================================

#[test]
fn test_scope_start_and_end_on_rebinding() {
    let registry = MethodRegistry::new();
    let main = MethodId::new("Main", 0);
    registry.register(
        main.clone(),
        generator(|emitter| {
            emitter.start_block("x = 5; x = 6");
            emitter.assign_literal("x", DirectValue::I32(5));
            emitter.assign_literal("x", DirectValue::I32(6));
            Ok(())
        }),
    );

    let result = Machine::default()
        .run(Arc::new(registry), &main, &[])
        .unwrap();

    let five = find_instance(&result, &DirectValue::I32(5));
    let six = find_instance(&result, &DirectValue::I32(6));
    let block = result.block(result.entry_context().unwrap().entry_block().unwrap());

    let x = VariableName::new("x");
    assert_eq!(block.scope_starts(five), std::slice::from_ref(&x));
    assert_eq!(block.scope_ends(five), std::slice::from_ref(&x));
    assert_eq!(block.scope_starts(six), std::slice::from_ref(&x));
    assert!(block.scope_ends(six).is_empty());
    assert_eq!(block.affected_instances(), &[five, six]);
}

#[test]
fn test_temporaries_are_not_scope_tracked() {
    let registry = MethodRegistry::new();
    let main = MethodId::new("Main", 0);
    registry.register(
        main.clone(),
        generator(|emitter| {
            emitter.start_block("$t = 5; $t = 6");
            emitter.assign_literal("$t", DirectValue::I32(5));
            emitter.assign_literal("$t", DirectValue::I32(6));
            Ok(())
        }),
    );

    let result = Machine::default()
        .run(Arc::new(registry), &main, &[])
        .unwrap();

    let five = find_instance(&result, &DirectValue::I32(5));
    let six = find_instance(&result, &DirectValue::I32(6));
    let block = result.block(result.entry_context().unwrap().entry_block().unwrap());

    assert!(block.scope_starts(five).is_empty());
    assert!(block.scope_ends(five).is_empty());
    assert!(block.scope_starts(six).is_empty());
    // Temporaries still count as affected, they just have no scope entries.
    assert_eq!(block.affected_instances(), &[five, six]);
}

#[test]
fn test_scope_end_lands_in_the_rebinding_block() {
    let registry = MethodRegistry::new();
    let main = MethodId::new("Main", 0);
    registry.register(
        main.clone(),
        generator(|emitter| {
            emitter.start_block("x = 5");
            emitter.assign_literal("x", DirectValue::I32(5));
            emitter.start_block("x = 6");
            emitter.assign_literal("x", DirectValue::I32(6));
            Ok(())
        }),
    );

    let result = Machine::default()
        .run(Arc::new(registry), &main, &[])
        .unwrap();

    let five = find_instance(&result, &DirectValue::I32(5));
    let six = find_instance(&result, &DirectValue::I32(6));
    let entry = result.entry_context().unwrap();
    let first = result.block(entry.entry_block().unwrap());
    let second = result.block(first.next().unwrap());

    let x = VariableName::new("x");
    assert_eq!(first.scope_starts(five), std::slice::from_ref(&x));
    assert!(first.scope_ends(five).is_empty());
    // The rebinding happened while the second block was current.
    assert_eq!(second.scope_ends(five), std::slice::from_ref(&x));
    assert_eq!(second.scope_starts(six), std::slice::from_ref(&x));
}

// ================================================================
// Remove providers
// ================================================================

#[test]
fn test_assignment_remove_provider_is_captured() {
    let registry = MethodRegistry::new();
    let main = MethodId::new("Main", 0);
    registry.register(
        main.clone(),
        generator(|emitter| {
            emitter.start_block("let x = 5");
            emitter.assign_literal_removable(
                "x",
                DirectValue::I32(5),
                RemoveProvider::Assignment {
                    variable: VariableName::new("x"),
                },
            );
            Ok(())
        }),
    );

    let result = Machine::default()
        .run(Arc::new(registry), &main, &[])
        .unwrap();

    let five = find_instance(&result, &DirectValue::I32(5));
    let block = result.block(result.entry_context().unwrap().entry_block().unwrap());
    assert_eq!(
        block.remove_providers(five),
        vec![RemoveProvider::Assignment {
            variable: VariableName::new("x"),
        }],
    );
}

#[test]
fn test_call_site_remove_providers_follow_optionality() {
    let registry = arithmetic_registry();
    let main = MethodId::new("Main", 0);
    registry.register(
        main.clone(),
        generator(|emitter| {
            emitter.start_block("Add(2, 3)");
            emitter.assign_literal("$a", DirectValue::I32(2));
            emitter.assign_literal("$b", DirectValue::I32(3));
            emitter.call_with_transform(
                add_method(),
                vec!["$a".into(), "$b".into()],
                Arc::new(OptionalArgs(vec![1])),
            );
            Ok(())
        }),
    );

    let result = Machine::default().run(registry, &main, &[]).unwrap();

    let two = find_instance(&result, &DirectValue::I32(2));
    let three = find_instance(&result, &DirectValue::I32(3));
    let block = result.block(result.entry_context().unwrap().entry_block().unwrap());

    assert_eq!(block.calls().len(), 1);
    assert_eq!(block.calls()[0].method(), &add_method());
    assert_eq!(block.calls()[0].arguments(), &[two, three]);

    // A non-optional argument can only vanish with the whole call.
    assert_eq!(
        block.remove_providers(two),
        vec![RemoveProvider::Call {
            method: add_method(),
        }],
    );
    // An optional argument can be deleted on its own.
    assert_eq!(
        block.remove_providers(three),
        vec![RemoveProvider::CallArgument {
            method: add_method(),
            index: 1,
        }],
    );
}

// ================================================================
// Dynamic calls
// ================================================================

#[test]
fn test_dynamic_call_runs_after_frame_completes() {
    let log = call_log();
    let registry = MethodRegistry::new();
    let deferred = MethodId::new("Deferred", 0);
    registry.register(deferred.clone(), logging_generator(log.clone(), "Deferred"));

    let main = MethodId::new("Main", 0);
    registry.register(main.clone(), {
        let log = log.clone();
        generator(move |emitter| {
            let queue_log = log.clone();
            let deferred = MethodId::new("Deferred", 0);
            emitter.start_block("Main");
            emitter.direct_invoke(native(move |context| {
                queue_log.lock().unwrap().push("queued");
                context.dynamic_call(deferred.clone(), vec![])
            }));
            emitter.direct_invoke(native({
                let log = log.clone();
                move |_context| {
                    log.lock().unwrap().push("after");
                    Ok(())
                }
            }));
            Ok(())
        })
    });

    Machine::default()
        .run(Arc::new(registry), &main, &[])
        .unwrap();

    // The deferred call drains only after the queueing frame finished.
    assert_eq!(*log.lock().unwrap(), vec!["queued", "after", "Deferred"]);
}

#[test]
fn test_inner_dynamic_call_precedes_pending_outer_one() {
    let log = call_log();
    let registry = MethodRegistry::new();
    let inner = MethodId::new("D1", 0);
    let pending = MethodId::new("D2", 0);
    let nested = MethodId::new("F", 0);
    registry.register(inner.clone(), logging_generator(log.clone(), "D1"));
    registry.register(pending.clone(), logging_generator(log.clone(), "D2"));

    // F logs itself and queues D1 while running.
    registry.register(nested.clone(), {
        let log = log.clone();
        generator(move |emitter| {
            let log = log.clone();
            emitter.start_block("F");
            emitter.direct_invoke(native(move |context| {
                log.lock().unwrap().push("F");
                context.dynamic_call(MethodId::new("D1", 0), vec![])
            }));
            Ok(())
        })
    });

    // Main queues F, then D2: F runs first with D2 waiting behind it.
    let main = MethodId::new("Main", 0);
    registry.register(main.clone(), {
        let log = log.clone();
        generator(move |emitter| {
            let log = log.clone();
            emitter.start_block("Main");
            emitter.direct_invoke(native(move |context| {
                log.lock().unwrap().push("Main");
                context.dynamic_call(MethodId::new("F", 0), vec![])?;
                context.dynamic_call(MethodId::new("D2", 0), vec![])
            }));
            Ok(())
        })
    });

    Machine::default()
        .run(Arc::new(registry), &main, &[])
        .unwrap();

    // F's own dynamic call strictly precedes the one queued behind F.
    assert_eq!(*log.lock().unwrap(), vec!["Main", "F", "D1", "D2"]);
}

#[test]
fn test_unresolved_dynamic_call_degrades_to_taint() {
    let registry = MethodRegistry::new();
    let main = MethodId::new("Main", 0);
    registry.register(
        main.clone(),
        generator(|emitter| {
            emitter.start_block("Main");
            emitter.direct_invoke(native(|context| {
                let argument = context.create_direct_instance(DirectValue::I32(9));
                context.set_value(&VariableName::new("arg"), argument)?;
                context.dynamic_call(MethodId::new("Missing", 1), vec![argument])
            }));
            Ok(())
        }),
    );

    let result = Machine::default()
        .run(Arc::new(registry), &main, &[])
        .unwrap();

    let argument = find_instance(&result, &DirectValue::I32(9));
    assert!(result.is_dirty(argument));
    assert!(result.is_dirty(result.last_return_value()));
}

#[test]
fn test_chained_calls_survive_a_taint_skipped_drain() {
    let log = call_log();
    let registry = MethodRegistry::new();
    let pending = MethodId::new("D2", 0);
    registry.register(pending.clone(), logging_generator(log.clone(), "D2"));

    // F queues an unresolvable call and then D2; the failed drain must not
    // drop D2 while Main's frame is still there to own it.
    let nested = MethodId::new("F", 0);
    registry.register(
        nested.clone(),
        generator(|emitter| {
            emitter.start_block("F");
            emitter.direct_invoke(native(|context| {
                context.dynamic_call(MethodId::new("Missing", 0), vec![])?;
                context.dynamic_call(MethodId::new("D2", 0), vec![])
            }));
            Ok(())
        }),
    );

    // Main calls F synchronously, so Main's frame is below F when F's
    // queue drains.
    let main = MethodId::new("Main", 0);
    registry.register(
        main.clone(),
        generator(|emitter| {
            emitter.start_block("F()");
            emitter.call(MethodId::new("F", 0), vec![]);
            Ok(())
        }),
    );

    Machine::default()
        .run(Arc::new(registry), &main, &[])
        .unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["D2"]);
}

// ================================================================
// Resolution and caching
// ================================================================

#[test]
fn test_static_resolution_is_cached() {
    let mut context = context_with(arithmetic_registry());
    let lhs = context.create_direct_instance(DirectValue::I32(1));
    let rhs = context.create_direct_instance(DirectValue::I32(2));

    let (_, first) = context.resolve_generator(&add_method(), &[lhs, rhs]);
    let (_, second) = context.resolve_generator(&add_method(), &[lhs, rhs]);

    assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
}

#[test]
fn test_overrides_are_not_cached() {
    let registry = MethodRegistry::new();
    let hooked = MethodId::new("Hooked", 0);
    registry.register_override(
        hooked.clone(),
        Arc::new(|_, _, _| {
            Some(crate::test::generator(|emitter| {
                emitter.nop();
                Ok(())
            }))
        }),
    );

    let mut context = context_with(Arc::new(registry));
    let (_, first) = context.resolve_generator(&hooked, &[]);
    let (_, second) = context.resolve_generator(&hooked, &[]);

    // Two call sites, two generators - override results bypass the cache.
    assert!(!Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
}

#[test]
fn test_dynamic_dispatch_directed_by_receiver_type() {
    let log = call_log();
    let registry = MethodRegistry::new();
    let speak = MethodId::dynamic("Speak", 1);
    let dog_speak = MethodId::new("Dog.Speak", 1);
    registry.register(dog_speak.clone(), logging_generator(log.clone(), "Dog.Speak"));
    registry.register_dynamic(speak.clone(), "Data.Dog", dog_speak.clone());

    let mut context = context_with(Arc::new(registry));
    let dog = context.create_instance(Arc::new(InstanceInfo::new("Data.Dog")));
    context.invoke(speak, vec![dog]).unwrap();
    drive(&mut context);

    assert_eq!(*log.lock().unwrap(), vec!["Dog.Speak"]);
    assert!(context.resolved_methods().contains(&dog_speak));
    assert!(!context.is_dirty(dog));
}

#[test]
fn test_unmapped_dynamic_dispatch_taints() {
    let registry = MethodRegistry::new();
    let speak = MethodId::dynamic("Speak", 1);

    let mut context = context_with(Arc::new(registry));
    let cat = context.create_instance(Arc::new(InstanceInfo::new("Data.Cat")));
    context.invoke(speak, vec![cat]).unwrap();

    assert_eq!(context.stack_depth(), 0);
    assert!(context.is_dirty(cat));
}

// ================================================================
// Variables and scopes
// ================================================================

#[test]
fn test_variable_read_falls_back_to_global_scope() {
    let registry = MethodRegistry::new();
    let reader = MethodId::new("Reader", 0);
    registry.register(
        reader.clone(),
        generator(|emitter| {
            emitter.start_block("return shared");
            emitter.assign("copy", "shared");
            emitter.ret("copy");
            Ok(())
        }),
    );

    let main = MethodId::new("Main", 0);
    registry.register(
        main.clone(),
        generator(|emitter| {
            emitter.start_block("shared = 7");
            emitter.assign_literal("$value", DirectValue::I32(7));
            emitter.assign_global("shared", "$value");
            emitter.start_block("return Reader()");
            emitter.call(MethodId::new("Reader", 0), vec![]);
            emitter.assign_return_value("result");
            emitter.ret("result");
            Ok(())
        }),
    );

    let result = Machine::default()
        .run(Arc::new(registry), &main, &[])
        .unwrap();

    assert_eq!(
        result.direct_value(result.last_return_value()),
        Some(&DirectValue::I32(7)),
    );
}

#[test]
fn test_unresolved_variable_is_fatal() {
    let registry = MethodRegistry::new();
    let main = MethodId::new("Main", 0);
    registry.register(
        main.clone(),
        generator(|emitter| {
            emitter.start_block("y = missing");
            emitter.assign("y", "missing");
            Ok(())
        }),
    );

    let outcome = Machine::default().run(Arc::new(registry), &main, &[]);
    assert!(matches!(
        outcome,
        Err(Error::UndefinedVariable { name }) if name.as_str() == "missing",
    ));
}

#[test]
fn test_unresolved_global_is_fatal() {
    let context = context_with(Arc::new(MethodRegistry::new()));
    assert!(matches!(
        context.get_global(&VariableName::new("nowhere")),
        Err(Error::UndefinedGlobal { .. }),
    ));
}

#[test]
fn test_conditional_loop_counts_down() {
    let log = call_log();
    let registry = MethodRegistry::new();
    let main = MethodId::new("Main", 0);
    registry.register(main.clone(), {
        let log = log.clone();
        generator(move |emitter| {
            let log = log.clone();
            emitter.start_block("while (n != 0) tick()");
            emitter.assign_literal("n", DirectValue::I32(3));
            let top = emitter.create_label();
            emitter.place_label(top)?;
            emitter.direct_invoke(native(move |context| {
                log.lock().unwrap().push("tick");
                let n = context.get_value(&VariableName::new("n"))?;
                let value = context
                    .instances()
                    .get(n)
                    .direct_value()
                    .and_then(DirectValue::as_i32)
                    .unwrap_or(0);
                let next = context.create_direct_instance(DirectValue::I32(value - 1));
                context.set_value(&VariableName::new("n"), next)
            }));
            emitter.conditional_jump("n", top);
            Ok(())
        })
    });

    Machine::default()
        .run(Arc::new(registry), &main, &[])
        .unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["tick", "tick", "tick"]);
}

// ================================================================
// Edits-provider swap
// ================================================================

#[test]
fn test_prepare_scopes_provider_to_call_instructions() {
    let registry = MethodRegistry::new();
    let main = MethodId::new("Main", 0);
    registry.register(
        main.clone(),
        generator(|emitter| {
            emitter.start_block("body");
            emitter.nop();
            emitter.nop();
            Ok(())
        }),
    );

    let mut context = context_with(Arc::new(registry));
    context.invoke(main, vec![]).unwrap();
    // Step once so the frame has a current block.
    let first = context.next_instruction().unwrap().unwrap();
    context.prepare(first.as_ref());
    first.execute(&mut context).unwrap();
    let block = context.current_frame().unwrap().current_block().unwrap();

    let info = Arc::new(InstructionInfo::new("call site"));
    let transform: Arc<dyn CallTransform> = Arc::new(OptionalArgs(vec![]));
    let call = instructions::Call::new(add_method(), vec![], Some(transform), info.clone());
    context.prepare(&call);
    let edits = context.edits().expect("call installs a provider");
    assert_eq!(edits.block(), block);

    // A direct invoke shares the enclosing call's provider.
    let invoke = instructions::DirectInvoke::new(native(|_| Ok(())), info.clone());
    context.prepare(&invoke);
    assert!(context.edits().is_some());

    // Any other instruction clears it.
    let nop = instructions::Nop::new(info.clone());
    context.prepare(&nop);
    assert!(context.edits().is_none());

    // A call without a transform provider installs nothing.
    let bare = instructions::Call::new(add_method(), vec![], None, info);
    context.prepare(&bare);
    assert!(context.edits().is_none());
}

// ================================================================
// Shared initializers
// ================================================================

#[test]
fn test_shared_initializer_runs_once_per_descriptor() {
    let log = call_log();
    let registry = MethodRegistry::new();
    let initializer = MethodId::new("Widget.SharedInit", 1);
    registry.register(
        initializer.clone(),
        logging_generator(log.clone(), "Widget.SharedInit"),
    );

    let main = MethodId::new("Main", 0);
    registry.register(main.clone(), {
        let log = log.clone();
        generator(move |emitter| {
            let log = log.clone();
            emitter.start_block("new Widget(); new Widget()");
            emitter.direct_invoke(native(move |context| {
                log.lock().unwrap().push("Main");
                context.create_instance(Arc::new(InstanceInfo::new("Widget")));
                context.create_instance(Arc::new(InstanceInfo::new("Widget")));
                Ok(())
            }));
            Ok(())
        })
    });

    let settings = MachineSettings::default().with_shared_initializer(Arc::new({
        let initializer = initializer.clone();
        move |info: &InstanceInfo| {
            (info.type_name() == "Widget").then(|| initializer.clone())
        }
    }));
    Machine::new(settings)
        .run(Arc::new(registry), &main, &[])
        .unwrap();

    // Two creations, one deferred initializer run.
    assert_eq!(*log.lock().unwrap(), vec!["Main", "Widget.SharedInit"]);
}

// ================================================================
// Execution limits
// ================================================================

#[test]
fn test_instruction_limit_aborts_runaway_loop() {
    let registry = MethodRegistry::new();
    let main = MethodId::new("Main", 0);
    registry.register(
        main.clone(),
        generator(|emitter| {
            emitter.start_block("loop {}");
            let top = emitter.create_label();
            emitter.place_label(top)?;
            emitter.nop();
            emitter.assign_literal("$one", DirectValue::I32(1));
            emitter.conditional_jump("$one", top);
            Ok(())
        }),
    );

    let settings = MachineSettings::default().with_limits(AnalysisLimits {
        max_instructions: 100,
        ..AnalysisLimits::default()
    });
    let outcome = Machine::new(settings).run(Arc::new(registry), &main, &[]);
    assert!(matches!(outcome, Err(Error::InstructionLimit { limit: 100 })));
}

#[test]
fn test_call_depth_limit_aborts_runaway_recursion() {
    let registry = MethodRegistry::new();
    let recurse = MethodId::new("Recurse", 0);
    registry.register(
        recurse.clone(),
        generator(|emitter| {
            emitter.start_block("Recurse()");
            emitter.call(MethodId::new("Recurse", 0), vec![]);
            Ok(())
        }),
    );

    let settings = MachineSettings::default().with_limits(AnalysisLimits {
        max_call_depth: 16,
        ..AnalysisLimits::default()
    });
    let outcome = Machine::new(settings).run(Arc::new(registry), &recurse, &[]);
    assert!(matches!(outcome, Err(Error::CallDepthLimit { limit: 16 })));
}

// ================================================================
// Call records
// ================================================================

#[test]
fn test_pushed_calls_are_registered_on_the_calling_block() {
    let registry = arithmetic_registry();
    let main = MethodId::new("Main", 0);
    registry.register(
        main.clone(),
        generator(|emitter| {
            emitter.start_block("Add(1, 1)");
            emitter.assign_literal("$a", DirectValue::I32(1));
            emitter.assign("$b", "$a");
            emitter.call(add_method(), vec!["$a".into(), "$b".into()]);
            Ok(())
        }),
    );

    let result = Machine::default().run(registry, &main, &[]).unwrap();

    let entry = result.entry_context().unwrap();
    let block = result.block(entry.entry_block().unwrap());
    assert_eq!(block.calls().len(), 1);
    assert_eq!(block.calls()[0].method(), &add_method());

    // The callee's frame points back at the block that issued the call.
    let callee = result
        .frames()
        .find(|frame| frame.method() == &add_method())
        .unwrap();
    assert_eq!(callee.calling_block(), Some(block.id()));
    assert_eq!(callee.caller(), Some(entry.id()));
}
