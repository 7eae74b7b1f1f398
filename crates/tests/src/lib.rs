//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 引擎行为场景测试（路径展开、模式匹配、fallback、feedback、flush）
//! - 从定义文件到输出 sink 的端到端测试
//! - 确定性与计数语义

#[cfg(test)]
mod support {
    use std::sync::{Arc, Mutex};

    use contracts::{Stage, StageContext, StageError};

    /// One `receive` or `flush` call as seen by a stage
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Call {
        pub stage: String,
        pub name: String,
        pub value: String,
        pub record: i32,
        pub entity: i32,
    }

    impl Call {
        pub fn new(stage: &str, name: &str, value: &str, record: i32, entity: i32) -> Self {
            Self {
                stage: stage.into(),
                name: name.into(),
                value: value.into(),
                record,
                entity,
            }
        }
    }

    pub type Log = Arc<Mutex<Vec<Call>>>;

    pub fn calls(log: &Log) -> Vec<Call> {
        log.lock().unwrap().clone()
    }

    /// `(stage, name, value)` of every call
    pub fn deliveries(log: &Log) -> Vec<(String, String, String)> {
        calls(log)
            .into_iter()
            .map(|c| (c.stage, c.name, c.value))
            .collect()
    }

    /// Stage recording every call, optionally emitting under a fixed name
    pub struct Recorder {
        name: String,
        log: Log,
        emit_as: Option<String>,
        fail_on: Option<String>,
        fail_flush: bool,
        fail_close: bool,
    }

    impl Recorder {
        pub fn new(name: &str, log: &Log) -> Self {
            Self {
                name: name.into(),
                log: Arc::clone(log),
                emit_as: None,
                fail_on: None,
                fail_flush: false,
                fail_close: false,
            }
        }

        pub fn emitting(name: &str, log: &Log, emit_as: &str) -> Self {
            Self {
                emit_as: Some(emit_as.into()),
                ..Self::new(name, log)
            }
        }

        pub fn failing_on(name: &str, log: &Log, value: &str) -> Self {
            Self {
                fail_on: Some(value.into()),
                ..Self::new(name, log)
            }
        }

        pub fn failing_flush(name: &str, log: &Log) -> Self {
            Self {
                fail_flush: true,
                ..Self::new(name, log)
            }
        }

        pub fn failing_close(name: &str, log: &Log) -> Self {
            Self {
                fail_close: true,
                ..Self::new(name, log)
            }
        }

        fn push(&self, name: &str, value: &str, ctx: &StageContext<'_>) {
            self.log.lock().unwrap().push(Call::new(
                &self.name,
                name,
                value,
                ctx.record_count(),
                ctx.entity_count(),
            ));
        }
    }

    impl Stage for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn receive(
            &mut self,
            name: &str,
            value: &str,
            ctx: &mut StageContext<'_>,
        ) -> Result<(), StageError> {
            if self.fail_on.as_deref() == Some(value) {
                return Err(StageError::new(format!("rejected '{value}'")));
            }
            self.push(name, value, ctx);
            if let Some(out) = &self.emit_as {
                ctx.emit(out.clone(), value);
            }
            Ok(())
        }

        fn flush(&mut self, ctx: &mut StageContext<'_>) -> Result<(), StageError> {
            if self.fail_flush {
                return Err(StageError::new("flush failed"));
            }
            self.push("<flush>", "", ctx);
            Ok(())
        }

        fn close(&mut self) -> Result<(), StageError> {
            self.log
                .lock()
                .unwrap()
                .push(Call::new(&self.name, "<close>", "", 0, 0));
            if self.fail_close {
                return Err(StageError::new("close failed"));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod scenario_tests {
    use contracts::StreamReceiver;
    use dispatcher::{DispatcherBuilder, EventCollector};

    use crate::support::{Call, Log, Recorder, calls, deliveries};

    #[test]
    fn test_nested_literal_reaches_bound_stage() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let r = builder.add_stage(Recorder::new("R", &log));
        builder.register("person.name", r).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.start_entity("person").unwrap();
        engine.literal("name", "Ada").unwrap();
        engine.end_entity().unwrap();
        engine.end_record().unwrap();

        assert_eq!(calls(&log), vec![Call::new("R", "person.name", "Ada", 1, 1)]);
        assert_eq!(engine.entity_depth(), 0);
        assert!(!engine.in_record());
    }

    #[test]
    fn test_single_char_wildcard() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let r = builder.add_stage(Recorder::new("R", &log));
        builder.register("lit-?", r).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.literal("lit", "x").unwrap();
        engine.literal("lit-A", "y").unwrap();
        engine.literal("lit-B", "z").unwrap();
        engine.end_record().unwrap();

        let got: Vec<(String, String)> = calls(&log)
            .into_iter()
            .map(|c| (c.name, c.value))
            .collect();
        assert_eq!(
            got,
            vec![
                ("lit-A".to_string(), "y".to_string()),
                ("lit-B".to_string(), "z".to_string()),
            ]
        );
    }

    #[test]
    fn test_unmatched_literal_goes_to_else() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let r1 = builder.add_stage(Recorder::new("R1", &log));
        let r2 = builder.add_stage(Recorder::new("R2", &log));
        builder.register("a", r1).unwrap();
        builder.register("_else", r2).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.literal("a", "1").unwrap();
        engine.literal("b", "2").unwrap();
        engine.end_record().unwrap();

        assert_eq!(
            deliveries(&log),
            vec![
                ("R1".to_string(), "a".to_string(), "1".to_string()),
                ("R2".to_string(), "b".to_string(), "2".to_string()),
            ]
        );
        assert_eq!(engine.stats().fallback, 1);
    }

    #[test]
    fn test_unmatched_without_fallback_is_dropped() {
        let mut engine = DispatcherBuilder::new().build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.literal("nobody", "listens").unwrap();
        engine.end_record().unwrap();

        assert!(engine.sink().literals().is_empty());
        assert_eq!(engine.stats().unmatched, 2, "record id and literal");
    }
}

#[cfg(test)]
mod matching_tests {
    use contracts::StreamReceiver;
    use dispatcher::{DispatcherBuilder, EventCollector};

    use crate::support::{Log, Recorder, deliveries};

    fn matched_paths(pattern: &str, paths: &[&str]) -> Vec<String> {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let r = builder.add_stage(Recorder::new("R", &log));
        builder.register(pattern, r).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        for path in paths {
            engine.literal(path, "v").unwrap();
        }
        engine.end_record().unwrap();
        deliveries(&log).into_iter().map(|(_, name, _)| name).collect()
    }

    #[test]
    fn test_fixed_length_wildcards() {
        assert_eq!(matched_paths("a?c", &["abc", "axc", "ac", "abcd"]), vec!["abc", "axc"]);
        assert_eq!(matched_paths("a[bc]d", &["abd", "acd", "aed"]), vec!["abd", "acd"]);
    }

    #[test]
    fn test_variable_length_wildcard() {
        assert_eq!(
            matched_paths("person.*", &["person.name", "person", "personal.x"]),
            vec!["person.name"]
        );
    }

    #[test]
    fn test_fan_out_in_registration_order() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let first = builder.add_stage(Recorder::new("first", &log));
        let second = builder.add_stage(Recorder::new("second", &log));
        builder.register("a", first).unwrap();
        builder.register("a", second).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.literal("a", "1").unwrap();
        engine.literal("a", "2").unwrap();
        engine.end_record().unwrap();

        let got: Vec<(String, String)> = deliveries(&log)
            .into_iter()
            .map(|(stage, _, value)| (stage, value))
            .collect();
        assert_eq!(
            got,
            vec![
                ("first".to_string(), "1".to_string()),
                ("second".to_string(), "1".to_string()),
                ("first".to_string(), "2".to_string()),
                ("second".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_overlapping_patterns_follow_registration_order() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let glob = builder.add_stage(Recorder::new("glob", &log));
        let exact = builder.add_stage(Recorder::new("exact", &log));
        let any = builder.add_stage(Recorder::new("any", &log));
        builder.register("a?c", glob).unwrap();
        builder.register("abc", exact).unwrap();
        builder.register("a*", any).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.literal("abc", "v").unwrap();
        engine.end_record().unwrap();

        let order: Vec<String> = deliveries(&log).into_iter().map(|(s, _, _)| s).collect();
        assert_eq!(order, vec!["glob", "exact", "any"]);
    }

    #[test]
    fn test_custom_separator() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let r = builder.add_stage(Recorder::new("R", &log));
        builder.entity_separator("/").unwrap();
        builder.register("a/b/c", r).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.start_entity("a").unwrap();
        engine.start_entity("b").unwrap();
        engine.literal("c", "deep").unwrap();
        engine.end_entity().unwrap();
        engine.end_entity().unwrap();
        engine.end_record().unwrap();

        assert_eq!(deliveries(&log).len(), 1);
    }
}

#[cfg(test)]
mod entity_tests {
    use contracts::{MorphError, StreamReceiver};
    use dispatcher::{DispatcherBuilder, EventCollector};

    use crate::support::{Call, Log, Recorder, calls};

    #[test]
    fn test_entity_end_dispatched_innermost_first() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let r = builder.add_stage(Recorder::new("R", &log));
        builder.register("e1.e2.d", r).unwrap();
        builder.register("e1.e2", r).unwrap();
        builder.register("e1", r).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.start_entity("e1").unwrap();
        engine.start_entity("e2").unwrap();
        engine.literal("d", "x").unwrap();
        engine.end_entity().unwrap();
        engine.end_entity().unwrap();
        engine.end_record().unwrap();

        assert_eq!(
            calls(&log),
            vec![
                Call::new("R", "e1.e2.d", "x", 1, 2),
                Call::new("R", "e1.e2", "", 1, 2),
                Call::new("R", "e1", "", 1, 1),
            ]
        );
    }

    #[test]
    fn test_entity_count_restored_for_parent_literals() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let r = builder.add_stage(Recorder::new("R", &log));
        builder.register("p.*", r).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.start_entity("p").unwrap();
        engine.literal("before", "1").unwrap();
        engine.start_entity("c").unwrap();
        engine.literal("inner", "2").unwrap();
        engine.end_entity().unwrap();
        engine.literal("after", "3").unwrap();
        engine.end_entity().unwrap();
        engine.end_record().unwrap();

        let counts: Vec<(String, i32)> = calls(&log)
            .into_iter()
            .map(|c| (c.name, c.entity))
            .collect();
        assert_eq!(
            counts,
            vec![
                ("p.before".to_string(), 1),
                ("p.c.inner".to_string(), 2),
                ("p.c".to_string(), 2),
                ("p.after".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_unmatched_end_entity_is_structural() {
        let mut engine = DispatcherBuilder::new().build(EventCollector::new());
        engine.start_record("7").unwrap();

        let err = engine.end_entity().unwrap_err();
        assert!(err.is_structural(), "got: {err}");
        assert!(err.to_string().contains("'7'"), "got: {err}");
    }

    #[test]
    fn test_unclosed_entity_then_next_record_succeeds() {
        let mut engine = DispatcherBuilder::new().build(EventCollector::new());
        engine.start_record("1").unwrap();
        engine.start_entity("open").unwrap();

        let err = engine.end_record().unwrap_err();
        assert!(matches!(err, MorphError::Structural { .. }), "got: {err}");
        assert!(err.to_string().contains("not balanced"), "got: {err}");

        engine.start_record("2").unwrap();
        engine.end_record().unwrap();
        assert_eq!(engine.record_count(), 2);
    }

    #[test]
    fn test_events_outside_record_are_structural() {
        let mut engine = DispatcherBuilder::new().build(EventCollector::new());
        assert!(engine.start_entity("e").unwrap_err().is_structural());
        assert!(engine.end_record().unwrap_err().is_structural());
    }
}

#[cfg(test)]
mod fallback_tests {
    use contracts::{Event, StreamReceiver};
    use dispatcher::{DispatcherBuilder, EventCollector};
    use stages::DataStage;

    use crate::support::{Call, Log, Recorder, calls};

    #[test]
    fn test_else_passes_marker_names_through_unchanged() {
        let mut builder = DispatcherBuilder::new();
        let pass = builder.add_stage(DataStage::new("pass", None));
        builder.register("_else", pass).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.literal("@id", "42").unwrap();
        engine.literal("\\x", "y").unwrap();
        engine.end_record().unwrap();

        assert_eq!(engine.sink().literals(), vec![("@id", "42"), ("\\x", "y")]);
        assert_eq!(engine.stats().feedback, 0);
    }

    #[test]
    fn test_else_receives_full_path() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let r = builder.add_stage(Recorder::new("R", &log));
        builder.register("_elseFlattened", r).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.start_entity("e").unwrap();
        engine.literal("x", "v").unwrap();
        engine.end_entity().unwrap();
        engine.end_record().unwrap();

        assert_eq!(calls(&log), vec![Call::new("R", "e.x", "v", 1, 1)]);
    }

    #[test]
    fn test_else_nested_reopens_unmatched_entities() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let bound = builder.add_stage(Recorder::new("bound", &log));
        let pass = builder.add_stage(DataStage::new("pass", None));
        builder.register("e1.a", bound).unwrap();
        builder.register("_elseNested", pass).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.start_entity("e1").unwrap();
        engine.literal("a", "1").unwrap();
        engine.literal("b", "2").unwrap();
        engine.start_entity("e2").unwrap();
        engine.literal("d", "3").unwrap();
        engine.end_entity().unwrap();
        engine.end_entity().unwrap();
        engine.end_record().unwrap();

        assert_eq!(calls(&log), vec![Call::new("bound", "e1.a", "1", 1, 1)]);
        assert_eq!(
            engine.sink().events(),
            &[
                Event::start_record("1"),
                Event::start_entity("e1"),
                Event::literal("b", "2"),
                Event::start_entity("e2"),
                Event::literal("d", "3"),
                Event::EndEntity,
                Event::EndEntity,
                Event::EndRecord,
            ]
        );
    }

    #[test]
    fn test_else_nested_skips_content_of_bound_entity() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let ruled = builder.add_stage(Recorder::new("ruled", &log));
        let pass = builder.add_stage(DataStage::new("pass", None));
        builder.register("e1", ruled).unwrap();
        builder.register("_elseNested", pass).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.start_entity("e1").unwrap();
        engine.literal("x", "hidden").unwrap();
        engine.end_entity().unwrap();
        engine.literal("top", "shown").unwrap();
        engine.end_record().unwrap();

        assert_eq!(calls(&log), vec![Call::new("ruled", "e1", "", 1, 1)]);
        assert_eq!(
            engine.sink().events(),
            &[
                Event::start_record("1"),
                Event::literal("top", "shown"),
                Event::EndRecord,
            ]
        );
    }

    #[test]
    fn test_second_fallback_keyword_ignored() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let first = builder.add_stage(Recorder::new("first", &log));
        let second = builder.add_stage(Recorder::new("second", &log));
        builder.register("_else", first).unwrap();
        builder.register("_elseNested", second).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.literal("x", "v").unwrap();
        engine.end_record().unwrap();

        let stages: Vec<String> = calls(&log).into_iter().map(|c| c.stage).collect();
        assert_eq!(stages, vec!["first"]);
    }
}

#[cfg(test)]
mod feedback_tests {
    use contracts::StreamReceiver;
    use dispatcher::{DispatcherBuilder, EventCollector};
    use stages::DataStage;

    use crate::support::{Log, Recorder, deliveries};

    #[test]
    fn test_marked_output_is_redispatched() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let first = builder.add_stage(Recorder::emitting("first", &log, "@title"));
        let second = builder.add_stage(DataStage::new("second", Some("title".into())));
        builder.register("245.a", first).unwrap();
        builder.register("@title", second).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.start_entity("245").unwrap();
        engine.literal("a", "Dune").unwrap();
        engine.end_entity().unwrap();
        engine.end_record().unwrap();

        assert_eq!(engine.sink().literals(), vec![("title", "Dune")]);
        assert_eq!(engine.stats().feedback, 1);
        assert_eq!(deliveries(&log).len(), 1);
    }

    #[test]
    fn test_unmatched_feedback_never_reaches_fallback_or_sink() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let first = builder.add_stage(Recorder::emitting("first", &log, "@nowhere"));
        let rest = builder.add_stage(Recorder::new("rest", &log));
        builder.register("a", first).unwrap();
        builder.register("_else", rest).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.literal("a", "v").unwrap();
        engine.end_record().unwrap();

        let stages: Vec<String> = deliveries(&log).into_iter().map(|(s, _, _)| s).collect();
        assert_eq!(stages, vec!["first"]);
        assert!(engine.sink().literals().is_empty());
    }

    #[test]
    fn test_feedback_chain() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let a = builder.add_stage(Recorder::emitting("a", &log, "@b"));
        let b = builder.add_stage(Recorder::emitting("b", &log, "@c"));
        let c = builder.add_stage(Recorder::emitting("c", &log, "out"));
        builder.register("in", a).unwrap();
        builder.register("@b", b).unwrap();
        builder.register("@c", c).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.literal("in", "v").unwrap();
        engine.end_record().unwrap();

        let stages: Vec<String> = deliveries(&log).into_iter().map(|(s, _, _)| s).collect();
        assert_eq!(stages, vec!["a", "b", "c"]);
        assert_eq!(engine.sink().literals(), vec![("out", "v")]);
    }
}

#[cfg(test)]
mod flush_tests {
    use contracts::{Event, StreamReceiver};
    use dispatcher::{DispatcherBuilder, EventCollector};
    use stages::ConcatStage;

    use crate::support::{Call, Log, Recorder, calls};

    #[test]
    fn test_record_flush_runs_before_end_record() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let r = builder.add_stage(Recorder::new("R", &log));
        builder.register("a", r).unwrap();
        builder.register_flush("record", r).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.literal("a", "v").unwrap();
        engine.end_record().unwrap();

        assert_eq!(
            calls(&log),
            vec![
                Call::new("R", "a", "v", 1, 0),
                Call::new("R", "<flush>", "", 1, 0),
            ]
        );
    }

    #[test]
    fn test_concat_per_record() {
        let mut builder = DispatcherBuilder::new();
        let concat = builder.add_stage(ConcatStage::new("c", Some("all".into())).delimiter(","));
        builder.register("v", concat).unwrap();
        builder.register_flush("record", concat).unwrap();
        let mut engine = builder.build(EventCollector::new());

        for (id, values) in [("1", vec!["a", "b"]), ("2", vec!["c"]), ("3", vec![])] {
            engine.start_record(id).unwrap();
            for value in values {
                engine.literal("v", value).unwrap();
            }
            engine.end_record().unwrap();
        }

        assert_eq!(engine.sink().literals(), vec![("all", "a,b"), ("all", "c")]);
    }

    #[test]
    fn test_concat_flushed_by_entity_end() {
        let mut builder = DispatcherBuilder::new();
        let concat = builder.add_stage(
            ConcatStage::new("c", Some("joined".into()))
                .delimiter(" ")
                .same_entity(true),
        );
        builder.register("e.x", concat).unwrap();
        builder.register_flush("e", concat).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        for values in [["a", "b"].as_slice(), ["c"].as_slice()] {
            engine.start_entity("e").unwrap();
            for value in values {
                engine.literal("x", value).unwrap();
            }
            engine.end_entity().unwrap();
        }
        engine.end_record().unwrap();

        assert_eq!(
            engine.sink().literals(),
            vec![("joined", "a b"), ("joined", "c")]
        );
    }

    #[test]
    fn test_flush_binding_runs_after_receive_bindings() {
        let mut builder = DispatcherBuilder::new();
        let concat = builder.add_stage(ConcatStage::new("c", Some("each".into())));
        builder.register("x", concat).unwrap();
        builder.register_flush("x", concat).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.literal("x", "1").unwrap();
        engine.literal("x", "2").unwrap();
        engine.end_record().unwrap();

        assert_eq!(engine.sink().literals(), vec![("each", "1"), ("each", "2")]);
    }

    #[test]
    fn test_flush_sees_current_entity_count() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let r = builder.add_stage(Recorder::new("R", &log));
        builder.register_flush("outer.inner", r).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.start_entity("outer").unwrap();
        engine.start_entity("inner").unwrap();
        engine.end_entity().unwrap();
        engine.end_entity().unwrap();
        engine.end_record().unwrap();

        assert_eq!(calls(&log), vec![Call::new("R", "<flush>", "", 1, 2)]);
    }

    #[test]
    fn test_entity_concat_flushed_at_record_end() {
        let mut builder = DispatcherBuilder::new();
        let concat = builder.add_stage(
            ConcatStage::new("c", Some("joined".into()))
                .delimiter(" ")
                .same_entity(true),
        );
        builder.register("e.x", concat).unwrap();
        builder.register_flush("record", concat).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.start_entity("e").unwrap();
        engine.literal("x", "a").unwrap();
        engine.literal("x", "b").unwrap();
        engine.end_entity().unwrap();
        engine.end_record().unwrap();

        assert_eq!(engine.sink().literals(), vec![("joined", "a b")]);
    }

    #[test]
    fn test_entity_concat_flushed_by_parent_entity() {
        let mut builder = DispatcherBuilder::new();
        let concat = builder.add_stage(
            ConcatStage::new("c", Some("joined".into()))
                .delimiter(" ")
                .same_entity(true),
        );
        builder.register("e.sub.x", concat).unwrap();
        builder.register_flush("e", concat).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.start_entity("e").unwrap();
        engine.start_entity("sub").unwrap();
        engine.literal("x", "a").unwrap();
        engine.end_entity().unwrap();
        engine.end_entity().unwrap();
        engine.end_record().unwrap();

        assert_eq!(engine.sink().literals(), vec![("joined", "a")]);
    }

    #[test]
    fn test_leftover_values_not_flushed_into_next_record() {
        let mut builder = DispatcherBuilder::new();
        let concat = builder.add_stage(ConcatStage::new("c", Some("all".into())));
        builder.register("v", concat).unwrap();
        builder.register_flush("done", concat).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        engine.literal("v", "stale").unwrap();
        engine.end_record().unwrap();

        engine.start_record("2").unwrap();
        engine.literal("done", "").unwrap();
        engine.end_record().unwrap();

        assert!(engine.sink().literals().is_empty());
    }

    #[test]
    fn test_failed_record_flush_still_ends_record() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let failing = builder.add_stage(Recorder::failing_flush("ff", &log));
        builder.register_flush("record", failing).unwrap();
        let mut engine = builder.build(EventCollector::new());

        engine.start_record("1").unwrap();
        let result = engine.end_record();
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("stage 'ff' failed on 'record'"), "got: {err}");

        assert!(!engine.in_record());
        assert_eq!(
            engine.sink().events(),
            &[Event::start_record("1"), Event::EndRecord]
        );
        assert_eq!(engine.stats().records, 1);

        engine.start_record("2").unwrap();
        assert!(engine.end_record().is_err());
        assert_eq!(engine.stats().records, 2);
    }

    #[test]
    fn test_empty_flush_key_rejected() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let r = builder.add_stage(Recorder::new("R", &log));
        assert!(builder.register_flush("", r).is_err());
    }
}

#[cfg(test)]
mod error_policy_tests {
    use contracts::{ErrorPolicy, MorphError, StreamReceiver};
    use dispatcher::{DispatcherBuilder, EventCollector};

    use crate::support::{Log, Recorder, deliveries};

    fn engine(policy: ErrorPolicy, log: &Log) -> dispatcher::Dispatcher<EventCollector> {
        let mut builder = DispatcherBuilder::new();
        let failing = builder.add_stage(Recorder::failing_on("failing", log, "bad"));
        let healthy = builder.add_stage(Recorder::new("healthy", log));
        builder.register("v", failing).unwrap();
        builder.register("v", healthy).unwrap();
        builder.error_policy(policy);
        builder.build(EventCollector::new())
    }

    #[test]
    fn test_fail_fast_reports_stage_and_path() {
        let log = Log::default();
        let mut engine = engine(ErrorPolicy::Fail, &log);

        engine.start_record("1").unwrap();
        let err = engine.literal("v", "bad").unwrap_err();
        assert!(matches!(err, MorphError::Dispatch { .. }), "got: {err}");
        let message = err.to_string();
        assert!(message.contains("stage 'failing' failed on 'v'"), "got: {message}");
        assert!(deliveries(&log).is_empty());
    }

    #[test]
    fn test_lenient_policy_continues_with_remaining_stages() {
        let log = Log::default();
        let mut engine = engine(ErrorPolicy::Log, &log);

        engine.start_record("1").unwrap();
        engine.literal("v", "bad").unwrap();
        engine.literal("v", "good").unwrap();
        engine.end_record().unwrap();

        assert_eq!(
            deliveries(&log),
            vec![
                ("healthy".to_string(), "v".to_string(), "bad".to_string()),
                ("failing".to_string(), "v".to_string(), "good".to_string()),
                ("healthy".to_string(), "v".to_string(), "good".to_string()),
            ]
        );
        assert_eq!(engine.stats().stage_failures, 1);
        assert_eq!(engine.stats().records, 1);
    }
}

#[cfg(test)]
mod close_tests {
    use contracts::{ErrorPolicy, StreamReceiver};
    use dispatcher::{DispatcherBuilder, EventCollector};

    use crate::support::{Log, Recorder, deliveries};

    fn closes(log: &Log) -> Vec<String> {
        deliveries(log)
            .into_iter()
            .filter(|(_, name, _)| name == "<close>")
            .map(|(stage, _, _)| stage)
            .collect()
    }

    #[test]
    fn test_close_stream_closes_every_stage() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        builder.add_stage(Recorder::new("a", &log));
        builder.add_stage(Recorder::new("b", &log));
        let mut engine = builder.build(EventCollector::new());

        engine.close_stream().unwrap();

        assert_eq!(closes(&log), vec!["a", "b"]);
        assert!(engine.sink().is_closed());
    }

    #[test]
    fn test_failed_close_still_closes_the_rest() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        builder.add_stage(Recorder::failing_close("first", &log));
        builder.add_stage(Recorder::failing_close("second", &log));
        builder.add_stage(Recorder::new("third", &log));
        let mut engine = builder.build(EventCollector::new());

        let result = engine.close_stream();
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("stage 'first' failed"), "got: {err}");

        assert_eq!(closes(&log), vec!["first", "second", "third"]);
        assert!(engine.sink().is_closed());
        assert_eq!(engine.stats().stage_failures, 2);
    }

    #[test]
    fn test_failed_close_under_lenient_policy() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        builder.add_stage(Recorder::failing_close("first", &log));
        builder.error_policy(ErrorPolicy::Log);
        let mut engine = builder.build(EventCollector::new());

        engine.close_stream().unwrap();
        assert!(engine.sink().is_closed());
    }
}

#[cfg(test)]
mod counter_tests {
    use contracts::StreamReceiver;
    use dispatcher::{DispatcherBuilder, EventCollector};

    use crate::support::{Call, Log, Recorder, calls};

    #[test]
    fn test_record_id_dispatched_with_counts() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let r = builder.add_stage(Recorder::new("R", &log));
        builder.register("_id", r).unwrap();
        let mut engine = builder.build(EventCollector::new());

        for id in ["r1", "r2", "r3"] {
            engine.start_record(id).unwrap();
            engine.start_entity("e").unwrap();
            engine.end_entity().unwrap();
            engine.end_record().unwrap();
        }

        assert_eq!(
            calls(&log),
            vec![
                Call::new("R", "_id", "r1", 1, 0),
                Call::new("R", "_id", "r2", 2, 0),
                Call::new("R", "_id", "r3", 3, 0),
            ]
        );
        assert_eq!(engine.stats().records, 3);
        assert_eq!(engine.stats().entities, 3);
    }

    #[test]
    fn test_entity_count_restarts_per_record() {
        let log = Log::default();
        let mut builder = DispatcherBuilder::new();
        let r = builder.add_stage(Recorder::new("R", &log));
        builder.register("e.v", r).unwrap();
        let mut engine = builder.build(EventCollector::new());

        for _ in 0..2 {
            engine.start_record("x").unwrap();
            for _ in 0..2 {
                engine.start_entity("e").unwrap();
                engine.literal("v", "1").unwrap();
                engine.end_entity().unwrap();
            }
            engine.end_record().unwrap();
        }

        let counts: Vec<(i32, i32)> = calls(&log).into_iter().map(|c| (c.record, c.entity)).collect();
        assert_eq!(counts, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
    }
}

#[cfg(test)]
mod definition_tests {
    use std::io::Write;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{Event, MapRegistry, StreamReceiver};
    use dispatcher::{EventCollector, create_sinks};

    const CATALOG: &str = r#"
[vars]
lang = "041"

[maps.langs]
entries = { ger = "German", eng = "English" }
default = "Other"

[[rules]]
source = "_id"
name = "id"

[[rules]]
source = "245.a"
stage = "case"
name = "title"
params = { to = "upper" }

[[rules]]
source = "$[lang].a"
stage = "lookup"
name = "language"
params = { map = "langs" }

[[rules]]
source = "650.a|651.a"
stage = "concat"
name = "subjects"
flush_with = "record"
params = { delimiter = "; " }
"#;

    fn feed<S: StreamReceiver>(engine: &mut S) {
        let events = [
            Event::start_record("r1"),
            Event::start_entity("245"),
            Event::literal("a", "dune"),
            Event::EndEntity,
            Event::start_entity("041"),
            Event::literal("a", "ger"),
            Event::literal("a", "fre"),
            Event::EndEntity,
            Event::start_entity("650"),
            Event::literal("a", "sf"),
            Event::EndEntity,
            Event::start_entity("651"),
            Event::literal("a", "desert"),
            Event::EndEntity,
            Event::EndRecord,
        ];
        for event in &events {
            engine.process(event).unwrap();
        }
    }

    fn expected() -> Vec<Event> {
        vec![
            Event::start_record("r1"),
            Event::literal("id", "r1"),
            Event::literal("title", "DUNE"),
            Event::literal("language", "German"),
            Event::literal("language", "Other"),
            Event::literal("subjects", "sf; desert"),
            Event::EndRecord,
        ]
    }

    #[test]
    fn test_definition_end_to_end() {
        let def = ConfigLoader::load_from_str(CATALOG, ConfigFormat::Toml).unwrap();
        let maps = ConfigLoader::load_tables(&def, None).unwrap();
        let mut engine = stages::assemble(&def, maps, EventCollector::new()).unwrap();

        feed(&mut engine);
        engine.close_stream().unwrap();

        assert_eq!(engine.sink().events(), expected().as_slice());
        assert!(engine.sink().is_closed());
    }

    #[test]
    fn test_replay_is_deterministic() {
        let def = ConfigLoader::load_from_str(CATALOG, ConfigFormat::Toml).unwrap();
        let run = || {
            let maps = ConfigLoader::load_tables(&def, None).unwrap();
            let mut engine = stages::assemble(&def, maps, EventCollector::new()).unwrap();
            feed(&mut engine);
            feed(&mut engine);
            engine.into_sink().take()
        };

        let first = run();
        assert_eq!(first.len(), 2 * expected().len());
        assert_eq!(first, run());
    }

    #[test]
    fn test_json_definition_matches_toml() {
        let toml_def = ConfigLoader::load_from_str(CATALOG, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&toml_def).unwrap();
        let def = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();

        let maps = ConfigLoader::load_tables(&def, None).unwrap();
        let mut engine = stages::assemble(&def, maps, EventCollector::new()).unwrap();
        feed(&mut engine);

        assert_eq!(engine.sink().events(), expected().as_slice());
    }

    #[test]
    fn test_file_definition_to_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("codes.tsv"), "x\tExpanded\n").unwrap();
        let out = dir.path().join("out").join("records.ndjson");

        let def_path = dir.path().join("morph.toml");
        let mut file = std::fs::File::create(&def_path).unwrap();
        write!(
            file,
            r#"
[maps.codes]
file = "codes.tsv"

[[rules]]
source = "code"
stage = "lookup"
params = {{ map = "codes", strict = "true" }}

[[sinks]]
name = "file"
sink_type = "file"
params = {{ path = "{}" }}

[[sinks]]
name = "log"
sink_type = "log"
"#,
            out.display()
        )
        .unwrap();
        drop(file);

        let def = ConfigLoader::load_from_path(&def_path).unwrap();
        let maps = ConfigLoader::load_tables(&def, def_path.parent()).unwrap();
        let sinks = create_sinks(&def.sinks).unwrap();
        let mut engine = stages::assemble(&def, maps, sinks).unwrap();

        engine.start_record("1").unwrap();
        engine.literal("code", "x").unwrap();
        engine.end_record().unwrap();
        engine.close_stream().unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        let events: Vec<Event> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(
            events,
            vec![
                Event::start_record("1"),
                Event::literal("code", "Expanded"),
                Event::EndRecord,
            ]
        );
    }

    #[test]
    fn test_strict_lookup_miss_under_lenient_policy() {
        let def = ConfigLoader::load_from_str(
            r#"
[engine]
error_policy = "log"

[maps.codes]
entries = { x = "Expanded" }

[[rules]]
source = "code"
stage = "lookup"
name = "expanded"
params = { map = "codes", strict = "true" }
"#,
            ConfigFormat::Toml,
        )
        .unwrap();
        let maps = ConfigLoader::load_tables(&def, None).unwrap();
        let mut engine = stages::assemble(&def, maps, EventCollector::new()).unwrap();

        engine.start_record("1").unwrap();
        engine.literal("code", "y").unwrap();
        engine.literal("code", "x").unwrap();
        engine.end_record().unwrap();

        assert_eq!(engine.sink().literals(), vec![("expanded", "Expanded")]);
        assert_eq!(engine.stats().stage_failures, 1);
    }

    #[test]
    fn test_maps_shared_through_registry() {
        let def = ConfigLoader::load_from_str(
            r#"
[maps.codes]

[[rules]]
source = "code"
stage = "lookup"
params = { map = "codes" }
"#,
            ConfigFormat::Toml,
        )
        .unwrap();
        let mut maps = MapRegistry::new();
        maps.put_value("codes", "k", "from-code");
        let mut engine = stages::assemble(&def, maps, EventCollector::new()).unwrap();

        engine.start_record("1").unwrap();
        engine.literal("code", "k").unwrap();
        engine.end_record().unwrap();

        assert_eq!(engine.sink().literals(), vec![("code", "from-code")]);
        assert_eq!(engine.maps().get_value("codes", "k"), Some("from-code"));
    }
}

#[cfg(test)]
mod observability_tests {
    use contracts::DispatchStats;
    use observability::{DispatchSummary, RunningStats, StatsSummary};

    #[test]
    fn test_summary_from_engine_stats() {
        let mut latency = RunningStats::default();
        latency.push(1.0);
        latency.push(3.0);

        let summary = DispatchSummary {
            stats: DispatchStats {
                records: 10,
                matched: 9,
                unmatched: 1,
                ..Default::default()
            },
            elapsed_secs: 5.0,
            batch_latency_ms: StatsSummary::from(&latency),
        };

        let text = summary.to_string();
        assert!(text.contains("Records: 10 (2.0/s)"), "got: {text}");
        assert!(text.contains("90.00%"), "got: {text}");
        assert!(text.contains("mean=2.000"), "got: {text}");
    }
}
