//! 控制器契约编译的端到端场景
//!
//! # 教案级注释概览
//!
//! - **核心目标 (Why)**：以公开 API 驱动完整编译流程，覆盖成功产物的形状与每一类失败的精确归因；
//! - **结构说明 (How)**：`user_controller()` 构造典型控制器，各用例在其基础上增删成员；
//!   模式文件用例验证 TOML 描述与代码构造的描述产生相同结果；
//! - **合同与边界 (What)**：只断言稳定契约（错误分类、成员名、阶段、绑定表内容），不依赖错误文本全文。

use std::sync::Arc;

use spark_controller::{
    CompileErrorKind, CompilerState, ContextKind, ControllerCompiler, IdentityCache, SessionPolicy,
    TypeRegistry,
    model::{ActionMarker, FieldDecl, MethodDecl, TypeDecl, known},
};
use tracing_test::traced_test;

const USER: &str = "app.web.UserController";

fn accessor_pair(decl: TypeDecl, suffix: &str) -> TypeDecl {
    decl.method(MethodDecl::new(format!("get{suffix}")).returning(known::STRING))
        .method(MethodDecl::new(format!("set{suffix}")).param(known::STRING))
}

fn user_controller() -> TypeDecl {
    let decl = TypeDecl::new(USER)
        .controller("/user", SessionPolicy::Stateless)
        .field(FieldDecl::new("name", known::STRING).bindable())
        .field(FieldDecl::new("age", known::STRING).bindable())
        .field(FieldDecl::new("ctx", known::REQUEST_CONTEXT))
        .method(
            MethodDecl::new("view")
                .returning(known::RESULT)
                .action(ActionMarker::new()),
        );
    accessor_pair(accessor_pair(decl, "Name"), "Age")
}

fn interceptors(registry: TypeRegistry) -> TypeRegistry {
    registry
        .with(TypeDecl::new("app.Auth").interceptor())
        .and_then(|r| r.with(TypeDecl::new("app.Audit").interceptor()))
        .and_then(|r| r.with(TypeDecl::new("app.NotAnInterceptor")))
        .expect("interceptors")
}

fn registry_of(decls: impl IntoIterator<Item = TypeDecl>) -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    for decl in decls {
        registry.register(decl).expect("register");
    }
    interceptors(registry)
}

#[test]
fn typical_controller_compiles_to_expected_tables() {
    let registry = registry_of([user_controller()]);
    let descriptor = ControllerCompiler::new(&registry, USER).compile().expect("compiles");

    assert_eq!(descriptor.name().as_str(), USER);
    assert_eq!(descriptor.url(), "/user");
    assert_eq!(descriptor.session_policy(), SessionPolicy::Stateless);
    assert_eq!(descriptor.parameters().keys().collect::<Vec<_>>(), ["age", "name"]);
    assert!(descriptor.converters().is_empty());
    assert_eq!(descriptor.context(ContextKind::Request), Some("ctx"));
    assert_eq!(descriptor.contexts().iter().count(), 1);

    let view = descriptor.action("view").expect("view action");
    assert_eq!(view.content_type(), known::DEFAULT_CONTENT_TYPE);
    assert!(view.interceptors().is_empty());
    assert_eq!(view.handler().to_string(), format!("{USER}.view() -> {}", known::RESULT));

    let age = descriptor.parameter("age").expect("age");
    assert_eq!(age.accessor().name(), "getAge");
    assert_eq!(age.mutator().name(), "setAge");
    assert_eq!(age.ty().as_str(), known::STRING);
}

#[test]
fn missing_mutator_names_the_expected_method() {
    let mut decl = user_controller();
    decl.methods.retain(|method| method.name != "setAge");
    let registry = registry_of([decl]);

    let error = ControllerCompiler::new(&registry, USER).compile().expect_err("fails");
    assert_eq!(error.kind(), CompileErrorKind::MissingMutator);
    assert_eq!(error.code(), "controller.parameter.mutator_missing");
    assert_eq!(error.subject(), USER);
    assert_eq!(error.member(), Some("setAge"));
    assert!(error.reason().contains("setAge(spark.lang.String)"));
    assert_eq!(error.stage(), CompilerState::ContextBound);
}

#[test]
fn missing_accessor_is_reported() {
    let mut decl = user_controller();
    decl.methods.retain(|method| method.name != "getName");
    let registry = registry_of([decl]);

    let error = ControllerCompiler::new(&registry, USER).compile().expect_err("fails");
    assert_eq!(error.kind(), CompileErrorKind::MissingAccessor);
    assert_eq!(error.member(), Some("getName"));
}

#[test]
#[traced_test]
fn duplicate_context_field_keeps_the_later_one() {
    let decl = user_controller()
        .field(FieldDecl::new("first", known::APPLICATION_CONTEXT))
        .field(FieldDecl::new("second", known::APPLICATION_CONTEXT));
    let registry = registry_of([decl]);

    let descriptor = ControllerCompiler::new(&registry, USER).compile().expect("compiles");
    assert_eq!(descriptor.context(ContextKind::Application), Some("second"));
    assert!(logs_contain("context slot declared twice"));
}

#[test]
fn placeholder_is_elided_from_interceptor_chain() {
    let decl = user_controller().method(
        MethodDecl::new("edit").returning(known::RESULT).action(
            ActionMarker::new()
                .intercepted_by("app.Auth")
                .intercepted_by(known::OBJECT)
                .intercepted_by("app.Audit"),
        ),
    );
    let registry = registry_of([decl]);

    let descriptor = ControllerCompiler::new(&registry, USER).compile().expect("compiles");
    let chain: Vec<_> = descriptor
        .action("edit")
        .expect("edit")
        .interceptors()
        .iter()
        .map(|interceptor| interceptor.name().as_str())
        .collect();
    assert_eq!(chain, ["app.Auth", "app.Audit"]);
}

#[test]
fn illegal_interceptor_names_type_and_action() {
    let decl = user_controller().method(
        MethodDecl::new("edit")
            .returning(known::RESULT)
            .action(ActionMarker::new().intercepted_by("app.NotAnInterceptor")),
    );
    let registry = registry_of([decl]);

    let error = ControllerCompiler::new(&registry, USER).compile().expect_err("fails");
    assert_eq!(error.kind(), CompileErrorKind::IllegalInterceptor);
    assert_eq!(error.member(), Some("edit"));
    assert!(error.reason().contains("app.NotAnInterceptor"));
    assert_eq!(error.stage(), CompilerState::ParameterBound);
}

#[test]
fn non_result_return_is_rejected_regardless_of_arity() {
    for method in [
        MethodDecl::new("list").returning(known::STRING),
        MethodDecl::new("list"),
        MethodDecl::new("list").param(known::STRING).returning("app.Page"),
    ] {
        let decl = user_controller().method(method.action(ActionMarker::new()));
        let registry = registry_of([decl]);
        let error = ControllerCompiler::new(&registry, USER).compile().expect_err("fails");
        assert_eq!(error.kind(), CompileErrorKind::InvalidActionSignature);
        assert_eq!(error.member(), Some("list"));
    }
}

#[test]
fn primitive_parameter_is_rejected() {
    let decl = user_controller().field(FieldDecl::new("count", "i64").bindable());
    let registry = registry_of([decl]);
    let error = ControllerCompiler::new(&registry, USER).compile().expect_err("fails");
    assert_eq!(error.kind(), CompileErrorKind::InvalidParameterType);
    assert_eq!(error.member(), Some("count"));
}

#[test]
fn converter_capability_is_inherited_through_supertypes() {
    let mut decl = user_controller();
    decl.fields[0] = FieldDecl::new("name", known::STRING).bindable_with("app.UpperCase");
    let registry = registry_of([
        decl,
        TypeDecl::new("app.BaseConverter").implements(known::CONVERTER),
        TypeDecl::new("app.UpperCase").extends("app.BaseConverter"),
        TypeDecl::new("app.NotAConverter"),
    ]);

    let descriptor = ControllerCompiler::new(&registry, USER).compile().expect("compiles");
    assert_eq!(descriptor.converter("name").map(|c| c.as_str()), Some("app.UpperCase"));
    assert_eq!(
        descriptor.parameter("name").and_then(|p| p.converter()).map(|c| c.as_str()),
        Some("app.UpperCase")
    );
    assert_eq!(descriptor.converter("age"), None);
}

#[test]
fn converter_without_capability_is_invalid() {
    let mut decl = user_controller();
    decl.fields[0] = FieldDecl::new("name", known::STRING).bindable_with("app.NotAConverter");
    let registry = registry_of([decl, TypeDecl::new("app.NotAConverter")]);

    let error = ControllerCompiler::new(&registry, USER).compile().expect_err("fails");
    assert_eq!(error.kind(), CompileErrorKind::InvalidConverter);
    assert_eq!(error.member(), Some("name"));
}

#[test]
fn object_converter_means_no_converter() {
    let mut decl = user_controller();
    decl.fields[0] = FieldDecl::new("name", known::STRING).bindable_with(known::OBJECT);
    let registry = registry_of([decl]);

    let descriptor = ControllerCompiler::new(&registry, USER).compile().expect("compiles");
    assert!(descriptor.converters().is_empty());
}

#[test]
fn mutator_may_be_inherited_from_public_superclass_method() {
    let decl = TypeDecl::new(USER)
        .controller("/user", SessionPolicy::Stateful)
        .extends("app.web.BaseController")
        .field(FieldDecl::new("name", known::STRING).bindable())
        .method(MethodDecl::new("getName").returning(known::STRING));
    let base = TypeDecl::new("app.web.BaseController")
        .method(MethodDecl::new("setName").param(known::STRING));
    let registry = registry_of([decl, base]);

    let descriptor = ControllerCompiler::new(&registry, USER).compile().expect("compiles");
    let mutator = descriptor.parameter("name").expect("name").mutator();
    assert_eq!(mutator.owner().as_str(), "app.web.BaseController");
}

#[test]
fn inherited_accessor_does_not_count() {
    let decl = TypeDecl::new(USER)
        .controller("/user", SessionPolicy::Stateful)
        .extends("app.web.BaseController")
        .field(FieldDecl::new("name", known::STRING).bindable())
        .method(MethodDecl::new("setName").param(known::STRING));
    let base = TypeDecl::new("app.web.BaseController")
        .method(MethodDecl::new("getName").returning(known::STRING));
    let registry = registry_of([decl, base]);

    let error = ControllerCompiler::new(&registry, USER).compile().expect_err("fails");
    assert_eq!(error.kind(), CompileErrorKind::MissingAccessor);
}

#[test]
fn unknown_or_unmarked_subjects_fail_early() {
    let registry = registry_of([TypeDecl::new("app.Plain")]);

    let unknown = ControllerCompiler::new(&registry, "app.Nowhere").compile().expect_err("unknown");
    assert_eq!(unknown.kind(), CompileErrorKind::InvalidSubject);

    let empty = ControllerCompiler::new(&registry, "").compile().expect_err("empty");
    assert_eq!(empty.kind(), CompileErrorKind::InvalidSubject);

    let plain = ControllerCompiler::new(&registry, "app.Plain").compile().expect_err("plain");
    assert_eq!(plain.kind(), CompileErrorKind::MissingContract);
}

#[test]
fn shared_cache_yields_one_identity_per_subject() {
    let registry = registry_of([user_controller()]);
    let cache = Arc::new(IdentityCache::new());

    let first = ControllerCompiler::new(&registry, USER)
        .with_cache(Arc::clone(&cache))
        .compile()
        .expect("compiles");
    let second = ControllerCompiler::new(&registry, USER)
        .with_cache(Arc::clone(&cache))
        .compile()
        .expect("compiles");

    assert_eq!(cache.len(), 1);
    assert_eq!(first, second);
    assert_eq!(first.identity().symbol(), "app::web::UserController");
}

#[test]
fn toml_schema_compiles_like_code_built_registry() {
    let schema = r#"
        [[types]]
        name = "app.web.UserController"
        controller = { url = "/user", session = "stateless" }

        [[types.field]]
        name = "name"
        type = "spark.lang.String"
        parameter = {}

        [[types.field]]
        name = "age"
        type = "spark.lang.String"
        parameter = {}

        [[types.field]]
        name = "ctx"
        type = "spark.api.RequestContext"

        [[types.method]]
        name = "view"
        returns = "spark.api.Result"
        action = {}

        [[types.method]]
        name = "getName"
        returns = "spark.lang.String"

        [[types.method]]
        name = "setName"
        params = ["spark.lang.String"]

        [[types.method]]
        name = "getAge"
        returns = "spark.lang.String"

        [[types.method]]
        name = "setAge"
        params = ["spark.lang.String"]
    "#;
    let from_schema = TypeRegistry::from_toml_str(schema).expect("schema");
    let from_code = TypeRegistry::new().with(user_controller()).expect("registry");

    let a = ControllerCompiler::new(&from_schema, USER).compile().expect("schema compiles");
    let b = ControllerCompiler::new(&from_code, USER).compile().expect("code compiles");
    assert_eq!(a, b);
    assert_eq!(a.identity().signature(), b.identity().signature());
}

#[test]
fn descriptor_serializes_for_code_generation() {
    let registry = registry_of([user_controller()]);
    let descriptor = ControllerCompiler::new(&registry, USER).compile().expect("compiles");
    let json = serde_json::to_value(&descriptor).expect("serialize");

    assert_eq!(json["url"], "/user");
    assert_eq!(json["session"], "stateless");
    assert_eq!(json["contexts"]["request"], "ctx");
    assert_eq!(json["identity"]["symbol"], "app::web::UserController");
    assert_eq!(json["actions"]["view"]["content_type"], "text/html");
}
