use proptest::prelude::*;

use zonelib::{Canonical, Clock, Federation, Inclusion, MaxBounds, Relation, Strictness, DBM};

const DIMENSIONS: Clock = 3;

fn constraints() -> impl Strategy<Value = Vec<(Clock, Clock, Relation)>> {
    prop::collection::vec(
        (0..DIMENSIONS, 0..DIMENSIONS, -8i32..8, any::<bool>()),
        0..6,
    )
    .prop_map(|constraints| {
        constraints
            .into_iter()
            .filter(|(i, j, _, _)| i != j)
            .map(|(i, j, limit, strict)| {
                (i, j, Relation::new(limit, Strictness::from_strict(strict)))
            })
            .collect()
    })
}

fn zone() -> impl Strategy<Value = DBM<Canonical>> {
    constraints().prop_map(|constraints| {
        let mut dbm = DBM::universe(DIMENSIONS);
        for (i, j, relation) in constraints {
            dbm.constrain(i, j, relation);
        }
        dbm
    })
}

fn federation() -> impl Strategy<Value = Federation> {
    prop::collection::vec(zone(), 0..4).prop_map(|dbms| Federation::from_dbms(DIMENSIONS, dbms))
}

proptest! {
    #[test]
    fn incremental_and_full_closure_agree(constraints in constraints()) {
        let mut incremental = DBM::universe(DIMENSIONS);
        let mut dirty = DBM::universe(DIMENSIONS).dirty();
        for (i, j, relation) in constraints {
            incremental.constrain(i, j, relation);
            dirty.tighten(i, j, relation);
        }

        let full = dirty.close();
        prop_assert_eq!(incremental.is_empty(), full.is_empty());
        prop_assert_eq!(incremental, full);
    }

    #[test]
    fn closure_is_idempotent(dbm in zone()) {
        prop_assert!(dbm.is_closed());
        prop_assert_eq!(dbm.clone(), DBM::from_raw(DIMENSIONS, &dbm.raw()));
    }

    #[test]
    fn constrained_zone_satisfies_constraint(dbm in zone(), constraint in constraints()) {
        for (i, j, relation) in constraint {
            let mut constrained = dbm.clone();
            if constrained.constrain(i, j, relation) {
                prop_assert!(constrained.satisfies(i, j, relation));
                prop_assert!(constrained.is_subset_of(&dbm));
            }
        }
    }

    #[test]
    fn subtraction_pieces_partition_the_minuend(a in zone(), b in zone()) {
        let pieces = a.subtraction(&b);

        for (index, piece) in pieces.iter().enumerate() {
            prop_assert!(piece.is_valid());
            prop_assert!(piece.is_subset_of(&a));
            prop_assert!(!piece.intersects(&b));
            for other in pieces.iter().skip(index + 1) {
                prop_assert!(!piece.intersects(other));
            }
        }

        let mut union = Federation::from_dbms(DIMENSIONS, pieces);
        if let Some(intersection) = a.clone().intersection(&b) {
            union.add(intersection);
        }
        prop_assert!(union.equals(&Federation::from_dbm(a)));
    }

    #[test]
    fn mutual_inclusion_is_equality(f in federation(), g in federation()) {
        if f.subset_eq(&g) && g.subset_eq(&f) {
            prop_assert_eq!(Inclusion::Equal, f.relation(&g, true));
        }

        let mut joined = f.clone();
        joined.append(&g);
        prop_assert!(joined.relation(&f, true).is_superset());
        prop_assert!(f.relation(&joined, false).is_subset());
    }

    #[test]
    fn reduction_is_idempotent_and_preserves_the_set(f in federation(), expensive in any::<bool>()) {
        let mut reduced = f.clone();
        reduced.reduce(expensive);
        prop_assert!(reduced.len() <= f.len());
        prop_assert!(reduced.equals(&f));

        let mut again = reduced.clone();
        again.reduce(expensive);
        let members: Vec<DBM<Canonical>> = reduced.iter().cloned().collect();
        let members_again: Vec<DBM<Canonical>> = again.iter().cloned().collect();
        prop_assert_eq!(members, members_again);
    }

    #[test]
    fn extrapolation_over_approximates(f in federation(), limits in prop::collection::vec(0i32..10, 2)) {
        let bounds = MaxBounds::from_limits(&limits).unwrap();

        let mut classical = f.clone();
        classical.extrapolate_max_bounds(&bounds);
        prop_assert!(f.subset_eq(&classical));

        let mut diagonal = f.clone();
        diagonal.extrapolate_diagonal_max_bounds(&bounds);
        prop_assert!(classical.subset_eq(&diagonal));
    }

    #[test]
    fn inverse_is_disjoint_complement(f in federation()) {
        let inverse = f.inverse();
        prop_assert!(!inverse.intersects(&f));

        let mut union = inverse;
        union.append(&f);
        prop_assert!(union.equals(&Federation::universe(DIMENSIONS)));
    }
}
