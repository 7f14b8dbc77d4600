//! End-to-end rendering of chart trees

use helmet_core::{Capabilities, Chart, ChartMetadata, ChartType, ReleaseInfo, RenderOptions, Values, coalesce_values};
use helmet_engine::{
    ClientProvider, Engine, EngineError, LookupError, RenderedTemplates, ResourceClient, Value,
};
use miette::Diagnostic;
use semver::Version;
use serde_json::{Value as JsonValue, json};

fn chart(name: &str) -> Chart {
    Chart::new(ChartMetadata::new(name, Version::new(1, 2, 3)))
}

fn options() -> RenderOptions {
    RenderOptions::new(ReleaseInfo::for_install("rel", "ns"))
}

fn render_with(engine: &Engine, chart: &Chart, caller: JsonValue) -> Result<RenderedTemplates, EngineError> {
    let values = coalesce_values(chart, &Values::from(caller))?;
    engine.render(chart, &values, &options())
}

fn render(chart: &Chart, caller: JsonValue) -> Result<RenderedTemplates, EngineError> {
    render_with(&Engine::default(), chart, caller)
}

#[test]
fn test_render_with_caller_values() {
    let moby = chart("moby")
        .with_values(Values::from(json!({"outer": "DEFAULT", "inner": "DEFAULT"})))
        .with_template("templates/test1", "{{.Values.outer | title }} {{.Values.inner | title}}")
        .unwrap()
        .with_template("templates/test2", "{{.Values.global.callme | lower }}")
        .unwrap()
        .with_template("templates/test3", "{{.noValue}}")
        .unwrap()
        .with_template("templates/test4", "{{toJson .Values}}")
        .unwrap()
        .with_template("templates/test5", "{{getHostByName \"helm.sh\"}}")
        .unwrap();

    let err = render(&moby, json!({})).unwrap_err();
    assert!(matches!(err, EngineError::Parse { .. }), "{}", err);

    let moby = chart("moby")
        .with_values(Values::from(json!({"outer": "DEFAULT", "inner": "DEFAULT"})))
        .with_template("templates/test1", "{{.Values.outer | title }} {{.Values.inner | title}}")
        .unwrap()
        .with_template("templates/test2", "{{.Values.global.callme | lower }}")
        .unwrap()
        .with_template("templates/test3", "{{.noValue}}")
        .unwrap()
        .with_template("templates/test4", "{{toJson .Values}}")
        .unwrap();

    let out = render(
        &moby,
        json!({"outer": "spouter", "inner": "inn", "global": {"callme": "Ishmael"}}),
    )
    .unwrap();

    assert_eq!(out["moby/templates/test1"], "Spouter Inn");
    assert_eq!(out["moby/templates/test2"], "ishmael");
    assert_eq!(out["moby/templates/test3"], "");
    assert_eq!(
        out["moby/templates/test4"],
        r#"{"global":{"callme":"Ishmael"},"inner":"inn","outer":"spouter"}"#
    );
    assert_eq!(out.len(), 4);
}

#[test]
fn test_render_defaults_and_null_deletion() {
    let moby = chart("moby")
        .with_values(Values::from(json!({"name": "moby", "port": 80})))
        .with_template("templates/a.yaml", "{{ .Values.name }}:{{ .Values.port }}")
        .unwrap();

    let out = render(&moby, json!({"port": null})).unwrap();
    assert_eq!(out["moby/templates/a.yaml"], "moby:");
}

#[test]
fn test_render_manifest_snapshot() {
    let moby = chart("moby")
        .with_values(Values::from(json!({"labels": {"app": "moby", "tier": "web"}})))
        .with_template(
            "templates/cm.yaml",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {{ .Release.Name }}-config\n  labels:\n    {{- toYaml .Values.labels | nindent 4 }}",
        )
        .unwrap();

    let out = render(&moby, json!({})).unwrap();
    insta::assert_snapshot!(out["moby/templates/cm.yaml"], @r"
    apiVersion: v1
    kind: ConfigMap
    metadata:
      name: rel-config
      labels:
        app: moby
        tier: web
    ");
}

#[test]
fn test_leading_newline_is_dropped() {
    let moby = chart("moby").with_template("templates/a.yaml", "\nkind: {{ .Chart.Name }}\n").unwrap();
    let out = render(&moby, json!({})).unwrap();
    assert_eq!(out["moby/templates/a.yaml"], "kind: moby\n");
}

#[test]
fn test_builtin_objects() {
    let moby = chart("moby")
        .with_file("config/a.txt", "hello")
        .with_template(
            "templates/a.yaml",
            "{{ .Release.Name }}/{{ .Release.Namespace }}/{{ .Release.IsInstall }} {{ .Template.Name }} {{ .Template.BasePath }}",
        )
        .unwrap()
        .with_template("templates/files.yaml", "{{ .Files.Get \"config/a.txt\" }}")
        .unwrap()
        .with_template(
            "templates/caps.yaml",
            "{{ .Capabilities.KubeVersion.Major }}.{{ .Capabilities.KubeVersion.Minor }} {{ .Capabilities.APIVersions.Has \"apps/v1\" }} {{ .Capabilities.APIVersions.Has \"apps/v1beta1\" }}",
        )
        .unwrap()
        .with_template("templates/chart.yaml", "{{ .Chart.Name }}-{{ .Chart.Version }} {{ .Chart.IsRoot }}")
        .unwrap();

    let out = render(&moby, json!({})).unwrap();
    assert_eq!(
        out["moby/templates/a.yaml"],
        "rel/ns/true moby/templates/a.yaml moby/templates"
    );
    assert_eq!(out["moby/templates/files.yaml"], "hello");
    assert_eq!(out["moby/templates/caps.yaml"], "1.28 true false");
    assert_eq!(out["moby/templates/chart.yaml"], "moby-1.2.3 true");
}

#[test]
fn test_capabilities_from_options() {
    let moby = chart("moby").with_template("templates/a.yaml", "{{ .Capabilities.KubeVersion }}").unwrap();
    let options = options().with_capabilities(Capabilities::default().with_kube_version("1.30.2"));

    let out = Engine::default().render(&moby, &Values::new(), &options).unwrap();
    assert_eq!(out["moby/templates/a.yaml"], "v1.30.2");
}

fn parent_and_child() -> Chart {
    let child = chart("child")
        .with_template("templates/_helpers.tpl", "{{- define \"test\" }}child{{ end -}}")
        .unwrap()
        .with_template("templates/c.yaml", "{{ include \"test\" . }}")
        .unwrap();
    chart("parent")
        .with_template("templates/_helpers.tpl", "{{- define \"test\" }}parent{{ end -}}")
        .unwrap()
        .with_template("templates/a.yaml", "{{ include \"test\" . }}")
        .unwrap()
        .with_template("templates/b.yaml", r#"{{ tpl "{{ include \"test\" . }}" . }}"#)
        .unwrap()
        .with_dependency(child)
        .unwrap()
}

#[test]
fn test_parent_definitions_win_every_time() {
    let tree = parent_and_child();
    for _ in 0..100 {
        let out = render(&tree, json!({})).unwrap();
        assert_eq!(out["parent/templates/a.yaml"], "parent");
        assert_eq!(out["parent/templates/b.yaml"], "parent");
        assert_eq!(out["parent/charts/child/templates/c.yaml"], "parent");
        assert!(!out.contains_key("parent/templates/_helpers.tpl"));
    }
}

#[test]
fn test_cross_chart_includes_are_deterministic() {
    let child = chart("child")
        .with_template("templates/_helpers.tpl", "{{- define \"child.name\" }}{{ .Chart.Name }}{{ end -}}")
        .unwrap()
        .with_template("templates/c.yaml", "{{ include \"parent.label\" . }}")
        .unwrap();
    let tree = chart("parent")
        .with_template(
            "templates/_helpers.tpl",
            "{{- define \"parent.label\" }}label-{{ include \"child.name\" . }}{{ end -}}",
        )
        .unwrap()
        .with_template("templates/a.yaml", "{{ include \"parent.label\" . }}")
        .unwrap()
        .with_dependency(child)
        .unwrap();

    let first = render(&tree, json!({})).unwrap();
    assert_eq!(first["parent/templates/a.yaml"], "label-parent");
    assert_eq!(first["parent/charts/child/templates/c.yaml"], "label-child");
    for _ in 0..100 {
        assert_eq!(render(&tree, json!({})).unwrap(), first);
    }
}

#[test]
fn test_shared_engine_renders_concurrently() {
    let engine = Engine::default();
    let charts: Vec<Chart> = (0..8)
        .map(|i| {
            chart(&format!("chart{}", i))
                .with_values(Values::from(json!({"id": i})))
                .with_template("templates/_helpers.tpl", format!("{{{{- define \"name\" }}}}helper-{}{{{{ end -}}}}", i))
                .unwrap()
                .with_template("templates/a.yaml", "{{ include \"name\" . }}")
                .unwrap()
                .with_template(
                    "templates/b.yaml",
                    r#"{{ tpl "{{- define \"local\" }}tpl-{{ .Values.id }}{{ end }}{{ include \"local\" . }}" . }}"#,
                )
                .unwrap()
        })
        .collect();

    std::thread::scope(|scope| {
        for (i, chart) in charts.iter().enumerate() {
            let engine = &engine;
            scope.spawn(move || {
                let name = format!("chart{}", i);
                for _ in 0..50 {
                    let out = render_with(engine, chart, json!({})).unwrap();
                    assert_eq!(out[&format!("{}/templates/a.yaml", name)], format!("helper-{}", i));
                    assert_eq!(out[&format!("{}/templates/b.yaml", name)], format!("tpl-{}", i));
                    assert_eq!(out.len(), 2);
                }
            });
        }
    });
}

#[test]
fn test_globals_flow_into_dependencies() {
    let child1 = chart("child1").with_template("templates/a.yaml", "{{ .Values.global.callme }}").unwrap();
    let child2 = chart("child2")
        .with_values(Values::from(json!({"global": {"mine": "child2"}})))
        .with_template("templates/a.yaml", "{{ .Values.global.callme }} {{ .Values.global.mine }}")
        .unwrap();
    let tree = chart("moby")
        .with_values(Values::from(json!({"global": {"callme": "Ishmael"}})))
        .with_template("templates/a.yaml", "{{ .Values.global.callme }}")
        .unwrap()
        .with_dependency(child1)
        .unwrap()
        .with_dependency(child2)
        .unwrap();

    let out = render(&tree, json!({"child1": {"global": {"callme": "Queequeg"}}})).unwrap();
    assert_eq!(out["moby/templates/a.yaml"], "Ishmael");
    assert_eq!(out["moby/charts/child1/templates/a.yaml"], "Queequeg");
    assert_eq!(out["moby/charts/child2/templates/a.yaml"], "Ishmael child2");
}

#[test]
fn test_subchart_sees_only_its_section() {
    let child = chart("child")
        .with_values(Values::from(json!({"replicas": 1})))
        .with_template("templates/a.yaml", "{{ .Values.replicas }} {{ .Values.outer }} {{ .Chart.IsRoot }}")
        .unwrap();
    let tree = chart("moby")
        .with_values(Values::from(json!({"outer": "x"})))
        .with_template("templates/a.yaml", "{{ .Subcharts.child.Values.replicas }}")
        .unwrap()
        .with_dependency(child)
        .unwrap();

    let out = render(&tree, json!({"child": {"replicas": 3}})).unwrap();
    assert_eq!(out["moby/charts/child/templates/a.yaml"], "3  false");
    assert_eq!(out["moby/templates/a.yaml"], "3");
}

#[test]
fn test_library_chart_renders_nothing_itself() {
    let mut metadata = ChartMetadata::new("common", Version::new(0, 1, 0));
    metadata.chart_type = ChartType::Library;
    let common = Chart::new(metadata)
        .with_template("templates/_names.tpl", "{{- define \"common.name\" }}{{ .Chart.Name }}{{ end -}}")
        .unwrap()
        .with_template("templates/cm.yaml", "kind: ConfigMap")
        .unwrap();
    let tree = chart("moby")
        .with_template("templates/a.yaml", "{{ include \"common.name\" . }}")
        .unwrap()
        .with_dependency(common)
        .unwrap();

    let out = render(&tree, json!({})).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out["moby/templates/a.yaml"], "moby");
}

#[test]
fn test_required_message_is_verbatim() {
    let moby = chart("moby").with_template(
        "templates/a.yaml",
        "{{ required \"A valid .Values.who is required!\\nsee: values.yaml\" .Values.who }}",
    )
    .unwrap();

    let err = render(&moby, json!({})).unwrap_err();
    assert_eq!(err.template(), Some("moby/templates/a.yaml"));
    assert!(
        err.to_string().contains("A valid .Values.who is required!\nsee: values.yaml"),
        "{}",
        err
    );

    let out = render(&moby, json!({"who": "Ahab"})).unwrap();
    assert_eq!(out["moby/templates/a.yaml"], "Ahab");

    let lint = Engine::builder().lint(true).build();
    let out = render_with(&lint, &moby, json!({})).unwrap();
    assert_eq!(out["moby/templates/a.yaml"], "");
}

#[test]
fn test_fail() {
    let moby = chart("moby").with_template("templates/a.yaml", "x{{ fail \"storage class is not supported\" }}").unwrap();

    let err = render(&moby, json!({})).unwrap_err();
    assert!(err.to_string().contains("error calling fail: storage class is not supported"), "{}", err);

    let lint = Engine::builder().lint(true).build();
    assert_eq!(render_with(&lint, &moby, json!({})).unwrap()["moby/templates/a.yaml"], "x");
}

#[test]
fn test_tpl_definitions_stay_local() {
    let moby = chart("moby").with_template(
        "templates/a.yaml",
        r#"{{ tpl "{{- define \"local\" }}x{{ end }}{{ include \"local\" . }}" . }}"#,
    )
    .unwrap();
    let out = render(&moby, json!({})).unwrap();
    assert_eq!(out["moby/templates/a.yaml"], "x");

    let moby = moby.with_template("templates/b.yaml", "{{ include \"local\" . }}").unwrap();
    let err = render(&moby, json!({})).unwrap_err();
    assert!(err.to_string().contains("no template \"local\""), "{}", err);
}

#[test]
fn test_tpl_uses_values_and_scope() {
    let moby = chart("moby")
        .with_values(Values::from(json!({"greeting": "hello {{ .Values.who }}", "who": "ahab"})))
        .with_template("templates/a.yaml", "{{ tpl .Values.greeting . }}")
        .unwrap()
        .with_template(
            "templates/b.yaml",
            "{{ tpl \"{{ .Template.Name }} {{ .Template.BasePath }}\" . }}",
        )
        .unwrap();

    let out = render(&moby, json!({})).unwrap();
    assert_eq!(out["moby/templates/a.yaml"], "hello ahab");
    assert_eq!(out["moby/templates/b.yaml"], "moby/templates/b.yaml moby/templates");
}

#[test]
fn test_self_include_is_a_nested_reference() {
    let err = render(&self_including_chart(), json!({})).unwrap_err().to_string();
    assert!(
        err.contains("rendering template has a nested reference name: recursion: unable to execute template"),
        "{}",
        &err[err.len().saturating_sub(500)..]
    );
}

#[test]
fn test_self_include_on_small_worker_stack() {
    let handle = std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(|| render(&self_including_chart(), json!({})).map(|_| ()).map_err(|err| err.to_string()))
        .unwrap();

    let err = handle.join().unwrap().unwrap_err();
    assert!(err.contains("nested reference name: recursion"));
}

fn self_including_chart() -> Chart {
    chart("moby")
        .with_template("templates/_helpers.tpl", "{{- define \"recursion\" }}{{ include \"recursion\" . }}{{ end -}}")
        .unwrap()
        .with_template("templates/a.yaml", "{{ include \"recursion\" . }}")
        .unwrap()
}

#[test]
fn test_repeated_include_is_not_recursion() {
    let moby = chart("moby")
        .with_template("templates/_helpers.tpl", "{{- define \"one\" }}x{{ end -}}")
        .unwrap()
        .with_template("templates/a.yaml", "{{ range until 4000 }}{{ include \"one\" $ }}{{ end }}")
        .unwrap();

    let out = render(&moby, json!({})).unwrap();
    assert_eq!(out["moby/templates/a.yaml"], "x".repeat(4000));
}

#[test]
fn test_nested_include_trace() {
    let common = chart("common").with_template(
        "templates/_helpers_2.tpl",
        "{{- define \"common.names.get_name\" -}}{{- .Values.nonexistant.key -}}{{- end -}}",
    )
    .unwrap();
    let moby = chart("moby")
        .with_template(
            "templates/_helpers_1.tpl",
            "{{- define \"nested_helper.name\" -}}{{- include \"common.names.get_name\" . -}}{{- end -}}",
        )
        .unwrap()
        .with_template("templates/svc.yaml", "{{ include \"nested_helper.name\" . }}")
        .unwrap()
        .with_dependency(common)
        .unwrap();

    let err = render(&moby, json!({})).unwrap_err();
    assert_eq!(err.template(), Some("moby/templates/svc.yaml"));
    assert_eq!(
        err.to_string(),
        "moby/templates/svc.yaml:1:3\n  \
         executing \"moby/templates/svc.yaml\" at <include \"nested_helper.name\" .>:\n    \
         error calling include:\n\
         moby/templates/_helpers_1.tpl:1:39\n  \
         executing \"nested_helper.name\" at <include \"common.names.get_name\" .>:\n    \
         error calling include:\n\
         moby/charts/common/templates/_helpers_2.tpl:1:49\n  \
         executing \"common.names.get_name\" at <.Values.nonexistant.key>:\n    \
         nil pointer evaluating interface {}.key"
    );
}

#[test]
fn test_missing_named_template() {
    let moby = chart("moby").with_template("templates/a.yaml", "{{ include \"nope\" . }}").unwrap();
    let err = render(&moby, json!({})).unwrap_err();
    let text = err.to_string();
    assert!(text.starts_with("moby/templates/a.yaml:1:3\n"), "{}", text);
    assert!(text.contains("no template \"nope\" associated with template"), "{}", text);
}

#[test]
fn test_strict_mode_missing_key() {
    let moby = chart("moby").with_template("templates/a.yaml", "[{{ .Values.missing }}]").unwrap();

    let out = render(&moby, json!({})).unwrap();
    assert_eq!(out["moby/templates/a.yaml"], "[]");

    let strict = Engine::builder().strict(true).build();
    let err = render_with(&strict, &moby, json!({})).unwrap_err();
    assert!(err.to_string().contains("map has no entry for key \"missing\""), "{}", err);
}

#[test]
fn test_parse_error_names_template_and_line() {
    let moby = chart("moby").with_template("templates/a.yaml", "kind: Service\nname: {{ toYml .Values }}").unwrap();

    let err = render(&moby, json!({})).unwrap_err();
    assert_eq!(
        err.to_string(),
        "parse error at (moby/templates/a.yaml:2): function \"toYml\" not defined"
    );
    let help = err.help().map(|h| h.to_string()).unwrap_or_default();
    assert!(help.contains("`toYaml`"), "{}", help);
}

#[test]
fn test_env_functions_are_absent() {
    let moby = chart("moby").with_template("templates/a.yaml", "{{ env \"HOME\" }}").unwrap();
    let err = render(&moby, json!({})).unwrap_err();
    assert!(err.to_string().contains("function \"env\" not defined"), "{}", err);

    let custom = Engine::builder()
        .simple_function("env", 1, |_| Ok(Value::from("leaked")))
        .build();
    assert!(render_with(&custom, &moby, json!({})).is_err());
}

#[test]
fn test_dns_is_opt_in() {
    let moby = chart("moby").with_template("templates/a.yaml", "{{ getHostByName \"127.0.0.1\" }}").unwrap();

    let err = render(&moby, json!({})).unwrap_err();
    assert!(err.to_string().contains("function \"getHostByName\" not defined"), "{}", err);

    let dns = Engine::builder().enable_dns(true).build();
    assert_eq!(render_with(&dns, &moby, json!({})).unwrap()["moby/templates/a.yaml"], "127.0.0.1");
}

#[test]
fn test_custom_function_overrides_builtin() {
    let engine = Engine::builder()
        .simple_function("upper", 1, |args| Ok(Value::from(format!("<{}>", args[0]))))
        .simple_function("shout", 1, |args| Ok(Value::from(format!("{}!", args[0]))))
        .build();
    let moby = chart("moby").with_template("templates/a.yaml", "{{ upper \"a\" }} {{ shout \"b\" }}").unwrap();

    let out = render_with(&engine, &moby, json!({})).unwrap();
    assert_eq!(out["moby/templates/a.yaml"], "<a> b!");
}

struct Pods(Vec<JsonValue>);

impl ResourceClient for &Pods {
    fn get(&self, namespace: Option<&str>, name: &str) -> Result<JsonValue, LookupError> {
        self.0
            .iter()
            .find(|pod| {
                pod["metadata"]["name"] == name && namespace.is_none_or(|ns| pod["metadata"]["namespace"] == ns)
            })
            .cloned()
            .ok_or_else(|| LookupError::NotFound {
                kind: "Pod".into(),
                name: name.into(),
            })
    }

    fn list(&self, namespace: Option<&str>) -> Result<Vec<JsonValue>, LookupError> {
        Ok(self
            .0
            .iter()
            .filter(|pod| namespace.is_none_or(|ns| pod["metadata"]["namespace"] == ns))
            .cloned()
            .collect())
    }
}

impl ClientProvider for Pods {
    fn get_client_for(
        &self,
        api_version: &str,
        kind: &str,
    ) -> Result<(Box<dyn ResourceClient + '_>, bool), LookupError> {
        if api_version == "v1" && kind == "Pod" {
            Ok((Box::new(self), true))
        } else {
            Err(LookupError::client(format!("no resource for {}/{}", api_version, kind)))
        }
    }
}

fn pods() -> Pods {
    Pods(vec![
        json!({"metadata": {"name": "pod1", "namespace": "default"}}),
        json!({"metadata": {"name": "pod2", "namespace": "kube-system"}}),
    ])
}

#[test]
fn test_lookup_through_provider() {
    let moby = chart("moby")
        .with_template("templates/a.yaml", "{{ (lookup \"v1\" \"Pod\" \"default\" \"pod1\").metadata.name }}")
        .unwrap()
        .with_template("templates/b.yaml", "{{ len (lookup \"v1\" \"Pod\" \"\" \"\").items }}")
        .unwrap()
        .with_template("templates/c.yaml", "{{ lookup \"v1\" \"Pod\" \"default\" \"gone\" | toJson }}")
        .unwrap();
    let provider = pods();

    let out = Engine::default()
        .render_with_client_provider(&moby, &Values::new(), &options(), &provider)
        .unwrap();
    assert_eq!(out["moby/templates/a.yaml"], "pod1");
    assert_eq!(out["moby/templates/b.yaml"], "2");
    assert_eq!(out["moby/templates/c.yaml"], "{}");

    let without = Engine::default().render(&moby, &Values::new(), &options());
    assert!(without.is_err(), "missing map entries on an empty lookup render as nil");
}

#[test]
fn test_lookup_error_fails_render() {
    let moby = chart("moby").with_template("templates/a.yaml", "{{ lookup \"v1\" \"Secret\" \"ns\" \"db\" }}").unwrap();
    let provider = pods();

    let err = Engine::default()
        .render_with_client_provider(&moby, &Values::new(), &options(), &provider)
        .unwrap_err();
    assert!(err.to_string().contains("no resource for v1/Secret"), "{}", err);

    let lint = Engine::builder().lint(true).build();
    let out = lint
        .render_with_client_provider(&moby, &Values::new(), &options(), &provider)
        .unwrap();
    assert_eq!(out["moby/templates/a.yaml"], "map[]");
}
