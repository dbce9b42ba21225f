use coffer::crypto::{AesCfbEngine, CipherEngine, IV_LEN, TAG_LEN};
use coffer::{Coffer, CofferError, DirStore, KdfHash, KdfParams, MemoryStore, Namespace, Store};
use std::sync::Arc;
use tempfile::tempdir;

fn fast_kdf() -> KdfParams {
    KdfParams::new(KdfHash::Sha256, 100, 32).unwrap()
}

#[test]
fn memory_store_holds_only_three_records_per_repository() {
    let store = Arc::new(MemoryStore::new());
    let coffer = Coffer::with_kdf(store.clone(), fast_kdf());
    let (repo_id, user_id) = coffer.create_repository("main", "sam", "pw").unwrap();

    for i in 0..5 {
        coffer
            .write_secret(&repo_id, &user_id, "pw", &format!("s{i}"), b"v")
            .unwrap();
    }

    assert_eq!(store.len(), 3);
    assert_eq!(
        coffer.describe(&repo_id, &user_id, "pw").unwrap().secrets,
        6
    );
}

#[test]
fn repository_survives_reopening_the_store() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("store");

    let (repo_id, user_id) = {
        let coffer = Coffer::with_kdf(DirStore::new(root.clone()), fast_kdf());
        let ids = coffer.create_repository("main", "sam", "pw").unwrap();
        coffer
            .write_secret(&ids.0, &ids.1, "pw", "db", b"hunter2")
            .unwrap();
        coffer.close().unwrap();
        ids
    };

    let coffer = Coffer::with_kdf(DirStore::new(root), fast_kdf());
    let secret = coffer.read_secret(&repo_id, &user_id, "pw", "db").unwrap();
    assert_eq!(&secret[..], b"hunter2");

    let names = coffer.list_secret_names(&repo_id, &user_id, "pw").unwrap();
    assert_eq!(names, vec!["db".to_string(), "hello".to_string()]);
}

#[test]
fn different_kdf_parameters_cannot_unlock() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("store");

    let coffer = Coffer::with_kdf(DirStore::new(root.clone()), fast_kdf());
    let (repo_id, user_id) = coffer.create_repository("main", "sam", "pw").unwrap();

    let other = KdfParams::new(KdfHash::Sha512, 100, 32).unwrap();
    let coffer = Coffer::with_kdf(DirStore::new(root), other);
    let result = coffer.read_secret(&repo_id, &user_id, "pw", "hello");
    assert!(matches!(result, Err(CofferError::Integrity)));
}

#[test]
fn shared_store_serves_independent_repositories() {
    let dir = tempdir().unwrap();
    let store = Arc::new(DirStore::new(dir.path().to_path_buf()));
    let coffer = Coffer::with_kdf(store.clone(), fast_kdf());

    let (repo_a, alice) = coffer.create_repository("a", "alice", "pw-a").unwrap();
    let (repo_b, bob) = coffer.create_repository("b", "bob", "pw-b").unwrap();

    coffer
        .write_secret(&repo_a, &alice, "pw-a", "only-a", b"1")
        .unwrap();

    assert!(matches!(
        coffer.read_secret(&repo_b, &bob, "pw-b", "only-a"),
        Err(CofferError::UnknownSecret(_))
    ));
    assert!(
        store
            .get(Namespace::CipherRepository, &repo_a)
            .unwrap()
            .is_some()
    );
}

#[test]
fn wrapped_key_is_bound_to_its_salt() {
    let dir = tempdir().unwrap();
    let store = Arc::new(DirStore::new(dir.path().to_path_buf()));
    let coffer = Coffer::with_kdf(store.clone(), fast_kdf());
    let (repo_id, user_id) = coffer.create_repository("main", "sam", "pw").unwrap();

    store
        .put(Namespace::UserSalt, &user_id, &[7u8; 32])
        .unwrap();

    let result = coffer.read_secret(&repo_id, &user_id, "pw", "hello");
    assert!(matches!(result, Err(CofferError::Integrity)));
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn cipher_roundtrips_any_plaintext(
            plaintext in proptest::collection::vec(any::<u8>(), 0..512),
            key in proptest::array::uniform32(any::<u8>()),
            iv in proptest::array::uniform16(any::<u8>()),
        ) {
            let record = AesCfbEngine.encrypt(&plaintext, &key, &iv).unwrap();
            prop_assert_eq!(record.len(), TAG_LEN + IV_LEN + plaintext.len());
            prop_assert_eq!(&record[TAG_LEN..TAG_LEN + IV_LEN], &iv[..]);

            let decrypted = AesCfbEngine.decrypt(&record, &key).unwrap();
            prop_assert_eq!(&decrypted[..], &plaintext[..]);
        }

        #[test]
        fn any_modified_byte_is_rejected(
            plaintext in proptest::collection::vec(any::<u8>(), 1..128),
            key in proptest::array::uniform32(any::<u8>()),
            iv in proptest::array::uniform16(any::<u8>()),
            position in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let mut record = AesCfbEngine.encrypt(&plaintext, &key, &iv).unwrap();
            let i = position.index(record.len());
            record[i] ^= flip;

            let result = AesCfbEngine.decrypt(&record, &key);
            prop_assert!(matches!(result, Err(CofferError::Integrity)));
        }

        #[test]
        fn wrong_key_is_rejected(
            plaintext in proptest::collection::vec(any::<u8>(), 0..128),
            key in proptest::array::uniform32(any::<u8>()),
            other in proptest::array::uniform32(any::<u8>()),
            iv in proptest::array::uniform16(any::<u8>()),
        ) {
            prop_assume!(key != other);
            let record = AesCfbEngine.encrypt(&plaintext, &key, &iv).unwrap();

            let result = AesCfbEngine.decrypt(&record, &other);
            prop_assert!(matches!(result, Err(CofferError::Integrity)));
        }
    }
}
