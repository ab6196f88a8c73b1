use super::*;

#[test]
fn find_provide_prefers_provide_over_build() {
    let layer = Layer {
        name: "a".into(),
        export: false,
        expose: false,
        store: false,
        version: String::new(),
        metadata: BTreeMap::new(),
        require: None,
        provide: Some(Provide {
            exec: Exec::default(),
            test: None,
            links: vec![],
            deps: vec![],
            env: Envs::default(),
            profile: vec![],
            lock_app: false,
        }),
        build: None,
    };
    assert!(layer.find_provide().is_some());
    assert!(!layer.has_both_provide_and_build());
}

#[test]
fn detects_both_provide_and_build_set() {
    let exec = Exec::default();
    let provide = Provide {
        exec,
        test: None,
        links: vec![],
        deps: vec![],
        env: Envs::default(),
        profile: vec![],
        lock_app: false,
    };
    let layer = Layer {
        name: "a".into(),
        export: false,
        expose: false,
        store: false,
        version: String::new(),
        metadata: BTreeMap::new(),
        require: None,
        provide: Some(provide.clone()),
        build: Some(provide),
    };
    assert!(layer.has_both_provide_and_build());
}

#[test]
fn parses_minimal_packfile_toml() {
    let text = r#"
        [config]
        id = "test/buildpack"

        [[layers]]
        name = "deps"
        export = true

        [layers.provide]
        inline = "echo hi"

        [[layers.provide.links]]
        name = "other"
        path-as = "OTHER_DIR"
        link-content = true
    "#;
    let pf: Packfile = toml::from_str(text).unwrap();
    assert_eq!(pf.layers.len(), 1);
    let layer = &pf.layers[0];
    assert_eq!(layer.name, "deps");
    let provide = layer.find_provide().unwrap();
    assert_eq!(provide.links.len(), 1);
    assert_eq!(provide.links[0].path_as.as_deref(), Some("OTHER_DIR"));
    assert!(provide.links[0].link_content);
}

#[test]
fn env_op_defaults_to_override() {
    let env: Env = toml::from_str(r#"name = "PATH"
value = "/x"
"#)
    .unwrap();
    assert_eq!(env.op, EnvOp::Override);
}
