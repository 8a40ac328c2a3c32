use std::collections::BTreeSet;

use crate::acl::{NewAccessRule, Resource, RuleResources, RuleUsers};
use crate::db::Database;

pub fn run_key_pair_tests(db: &Database) {
    db.with_transaction(|tx, _cache| {
        assert!(!tx.is_public_key_exists("alice").unwrap());
        assert_eq!(tx.get_private_key("alice").unwrap(), None);

        tx.create_key_pair("alice", "secret").unwrap();
        assert!(tx.is_public_key_exists("alice").unwrap());
        assert!(!tx.is_public_key_exists("Alice").unwrap());
        assert_eq!(
            tx.get_private_key("alice").unwrap(),
            Some(String::from("secret"))
        );

        // Public keys are unique, the original private key is kept
        assert!(tx.create_key_pair("alice", "other").is_err());
        assert_eq!(
            tx.get_private_key("alice").unwrap(),
            Some(String::from("secret"))
        );
        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx, _cache| {
        tx.delete_key_pair("alice")?;
        assert!(!tx.is_public_key_exists("alice")?);
        Ok(())
    })
    .unwrap();
}

pub fn run_access_rule_tests(db: &Database) {
    let first = NewAccessRule::for_users(BTreeSet::from([Resource::ImageGet]), ["alice"]).unwrap();
    let second = NewAccessRule::new(RuleResources::Group("editors".into()), RuleUsers::Any).unwrap();

    let (first_id, second_id) = db
        .with_transaction(|tx, _cache| {
            let first_id = tx.create_access_rule("key", &first)?;
            let second_id = tx.create_access_rule("key", &second)?;
            tx.create_access_rule("other", &second)?;
            Ok((first_id, second_id))
        })
        .unwrap();
    assert!(second_id > first_id);

    db.with_transaction(|tx, _cache| {
        let rules = tx.list_access_rules("key")?;
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].id, first_id);
        assert_eq!(rules[0].rule, first);
        assert_eq!(rules[1].rule, second);

        let rule = tx.get_access_rule("key", second_id)?.unwrap();
        assert_eq!(rule.rule, second);
        assert!(tx.get_access_rule("other", first_id)?.is_none());
        assert!(tx.list_access_rules("nobody")?.is_empty());

        tx.delete_access_rule("key", first_id)?;
        assert_eq!(tx.list_access_rules("key")?.len(), 1);

        let keys = tx.delete_group_access_rules("editors")?;
        assert_eq!(keys, vec![String::from("key"), String::from("other")]);
        assert!(tx.list_access_rules("key")?.is_empty());

        tx.create_access_rule("key", &first)?;
        tx.create_access_rule("key", &first)?;
        assert_eq!(tx.delete_access_rules("key")?, 2);
        Ok(())
    })
    .unwrap();
}

pub fn run_group_tests(db: &Database) {
    db.with_transaction(|tx, _cache| {
        assert_eq!(tx.count_groups()?, 0);
        assert_eq!(tx.get_group("editors")?, None);

        let editors = BTreeSet::from([Resource::ImageGet, Resource::MetadataPut]);
        tx.create_group("editors", &editors)?;
        tx.create_group("admins", &BTreeSet::from([Resource::KeysPut]))?;
        tx.create_group("viewers", &BTreeSet::from([Resource::ImageGet]))?;
        assert!(tx.create_group("editors", &editors).is_err());
        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx, _cache| {
        let editors = BTreeSet::from([Resource::ImageGet, Resource::MetadataPut]);
        assert_eq!(tx.count_groups()?, 3);
        assert_eq!(tx.get_group("editors")?, Some(editors));

        let groups = tx.list_groups(0, 2)?;
        let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["admins", "editors"]);
        let groups = tx.list_groups(2, 2)?;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "viewers");

        let updated = BTreeSet::from([Resource::ImageDelete]);
        tx.update_group("editors", &updated)?;
        assert_eq!(tx.get_group("editors")?, Some(updated));

        tx.delete_group("editors")?;
        assert_eq!(tx.get_group("editors")?, None);
        assert_eq!(tx.count_groups()?, 2);
        Ok(())
    })
    .unwrap();
}
