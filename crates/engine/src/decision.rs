// SPDX-License-Identifier: MIT

/// Inputs to the layer decision matrix (spec.md §4.5.4), already resolved
/// by the caller so this stays a pure function.
#[derive(Debug, Clone)]
pub struct DecisionInputs<'a> {
    pub cached_build_id: &'a str,
    pub last_build_id: &'a str,
    pub old_version: &'a str,
    pub new_version: &'a str,
    pub old_digest: &'a str,
    pub new_digest: &'a str,
    pub lock_app: bool,
    pub exists_on_disk: bool,
    pub expose: bool,
    pub store: bool,
}

/// `(exists, matched)`, per the table in spec.md §4.5.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub exists: bool,
    pub matched: bool,
}

impl Decision {
    const REBUILD: Decision = Decision {
        exists: false,
        matched: false,
    };
    const SKIP: Decision = Decision {
        exists: false,
        matched: true,
    };
    const REUSE: Decision = Decision {
        exists: true,
        matched: true,
    };
}

pub fn decide(inputs: &DecisionInputs<'_>) -> Decision {
    if inputs.cached_build_id != inputs.last_build_id {
        return Decision::REBUILD;
    }
    if inputs.new_digest != inputs.old_digest {
        return Decision::REBUILD;
    }
    if inputs.new_version != inputs.old_version && !inputs.new_version.is_empty() {
        return Decision::REBUILD;
    }
    if inputs.lock_app {
        return Decision::REBUILD;
    }
    if !inputs.exists_on_disk {
        if !inputs.expose && !inputs.store {
            return Decision::SKIP;
        }
        return Decision::REBUILD;
    }
    Decision::REUSE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DecisionInputs<'static> {
        DecisionInputs {
            cached_build_id: "b1",
            last_build_id: "b1",
            old_version: "1.0",
            new_version: "1.0",
            old_digest: "d1",
            new_digest: "d1",
            lock_app: false,
            exists_on_disk: true,
            expose: false,
            store: false,
        }
    }

    #[test]
    fn unchanged_inputs_reuse() {
        assert_eq!(decide(&base()), Decision::REUSE);
    }

    #[test]
    fn rolled_build_id_forces_rebuild() {
        let mut i = base();
        i.last_build_id = "b0";
        assert_eq!(decide(&i), Decision::REBUILD);
    }

    #[test]
    fn changed_digest_forces_rebuild() {
        let mut i = base();
        i.new_digest = "d2";
        assert_eq!(decide(&i), Decision::REBUILD);
    }

    #[test]
    fn changed_nonempty_version_forces_rebuild() {
        let mut i = base();
        i.new_version = "2.0";
        assert_eq!(decide(&i), Decision::REBUILD);
    }

    #[test]
    fn empty_new_version_does_not_force_rebuild_on_its_own() {
        let mut i = base();
        i.old_version = "1.0";
        i.new_version = "";
        assert_eq!(decide(&i), Decision::REUSE);
    }

    #[test]
    fn lock_app_always_rebuilds() {
        let mut i = base();
        i.lock_app = true;
        assert_eq!(decide(&i), Decision::REBUILD);
    }

    #[test]
    fn missing_and_not_retained_skips_without_rebuild() {
        let mut i = base();
        i.exists_on_disk = false;
        assert_eq!(decide(&i), Decision::SKIP);
    }

    #[test]
    fn missing_but_exposed_rebuilds() {
        let mut i = base();
        i.exists_on_disk = false;
        i.expose = true;
        assert_eq!(decide(&i), Decision::REBUILD);
    }

    #[test]
    fn missing_but_stored_rebuilds() {
        let mut i = base();
        i.exists_on_disk = false;
        i.store = true;
        assert_eq!(decide(&i), Decision::REBUILD);
    }
}
