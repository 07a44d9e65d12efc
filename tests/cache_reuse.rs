//! Per-object cache validity: reuse, monotonic mask growth, mapping
//! upgrades and invalidation.

mod common;

use common::{quad, Duplicate, Translate};
use mesh_modstack::attr::{AttrDomain, AttrKind, AttrMask};
use mesh_modstack::cache::{Object, ObjectEval};
use mesh_modstack::modifier::EvalPurpose;
use mesh_modstack::origindex;
use std::sync::Arc;

fn object_with_stack() -> Object {
    let mut ob = Object::new("cube", Arc::new(quad()));
    ob.modifiers.push(Arc::new(Translate::by([0.0, 0.0, 1.0])));
    ob.modifiers.push(Arc::new(Duplicate));
    ob
}

#[test]
fn identical_requests_share_one_run() {
    let mut ev = ObjectEval::new(object_with_stack());
    let a = ev.get_final(&AttrMask::BARE, false).unwrap();
    let b = ev.get_final(&AttrMask::BARE, false).unwrap();
    assert_eq!(ev.pipeline_runs(), 1);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.points_num(), 8);
}

#[test]
fn narrower_request_is_served_from_a_wider_cache() {
    let mut ev = ObjectEval::new(object_with_stack());
    let wide = common::bare_plus(AttrDomain::Point, AttrKind::Orco);
    ev.get_final(&wide, false).unwrap();
    ev.get_final(&AttrMask::BARE, false).unwrap();
    assert_eq!(ev.pipeline_runs(), 1);
}

#[test]
fn mask_growth_is_monotonic_across_misses() {
    let mut ev = ObjectEval::new(object_with_stack());
    ev.get_final(&common::bare_plus(AttrDomain::Point, AttrKind::Orco), false)
        .unwrap();
    let with_uv = common::bare_plus(AttrDomain::Corner, AttrKind::Uv);
    let mesh = ev.get_final(&with_uv, false).unwrap();
    assert_eq!(ev.pipeline_runs(), 2);
    // the rebuild kept the earlier orco requirement alive
    assert!(mesh.table(AttrDomain::Point).has(AttrKind::Orco));
}

#[test]
fn mapping_upgrade_forces_a_rerun() {
    let mut ev = ObjectEval::new(object_with_stack());
    let plain = ev.get_final(&AttrMask::BARE, false).unwrap();
    assert!(origindex::origindex(&plain, AttrDomain::Point).is_none());

    let mapped = ev.get_final(&AttrMask::BARE, true).unwrap();
    assert_eq!(ev.pipeline_runs(), 2);
    let origins = origindex::origindex(&mapped, AttrDomain::Point).unwrap();
    assert_eq!(origins.len(), 8);

    // a mapped cache keeps serving unmapped requests
    ev.get_final(&AttrMask::BARE, false).unwrap();
    assert_eq!(ev.pipeline_runs(), 2);
}

#[test]
fn invalidation_drops_everything() {
    let mut ev = ObjectEval::new(object_with_stack());
    let before = ev.get_final(&AttrMask::BARE, false).unwrap();
    ev.invalidate();
    let after = ev.get_final(&AttrMask::BARE, false).unwrap();
    assert_eq!(ev.pipeline_runs(), 1);
    assert!(!Arc::ptr_eq(&before, &after));
}

#[test]
fn one_off_evaluations_leave_the_cache_alone() {
    let mut ev = ObjectEval::new(object_with_stack());
    ev.get_final(&AttrMask::BARE, false).unwrap();
    let one_off = ev
        .create_eval_final(&AttrMask::BARE, EvalPurpose::Render)
        .unwrap();
    assert_eq!(one_off.final_mesh().points_num(), 8);
    assert_eq!(ev.pipeline_runs(), 1);

    let undeformed = ev.create_eval_no_deform(&AttrMask::BARE, EvalPurpose::Render);
    assert_eq!(undeformed.final_mesh().positions().unwrap()[0][2], 0.0);
    assert_eq!(ev.pipeline_runs(), 1);
}

#[test]
fn deform_only_mesh_is_cached_alongside_the_final() {
    let mut ev = ObjectEval::new(object_with_stack());
    let deform = ev.get_deform_only(&AttrMask::BARE).unwrap();
    assert_eq!(deform.points_num(), 4);
    assert_eq!(deform.positions().unwrap()[0], [0.0, 0.0, 1.0]);
    let final_mesh = ev.get_final(&AttrMask::BARE, false).unwrap();
    assert_eq!(final_mesh.points_num(), 8);
    assert_eq!(ev.pipeline_runs(), 1);
}
