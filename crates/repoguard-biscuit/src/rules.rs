//! Inference rules and policies installed in every authorizer.
//!
//! These restate the in-process decision rule in Datalog:
//!
//! - the token's user must be the request subject
//! - the subject is present in every group it belongs to directly, and in
//!   every group nested under one it is present in
//! - the target repo reaches each repogroup that contains it
//! - a `role` fact over a reachable principal and resource allows when the
//!   role's action set contains the requested action
//!
//! Anything not allowed is denied.

pub const RULES: &str = r#"
check if user($u), subject($u);

member_of($g) <- user($u), subject($u), usergroup($g, $u);
member_of($child) <- member_of($parent), usergroup($parent, $child), $child.starts_with("usergroupid:");

principal($u) <- user($u), subject($u);
principal($g) <- member_of($g);

target($r) <- operation($a, $r);
target($g) <- operation($a, $r), repogroup($g, $r);

permitted($a, $p, $res, $role) <- operation($a, $r), principal($p), target($res), role($p, $res, $role), repo_role_actions($role, $actions), $actions.contains($a);

allow if permitted($a, $p, $res, $role);
deny if true;
"#;
