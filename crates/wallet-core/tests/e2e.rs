//! End-to-end keygen, signing, rotation and recovery scenarios
//!
//! Every party runs in-process; the test driver plays the transport,
//! fanning each round's outbound batch back out through the router.

use mpc_wallet_core::{
    curve::CurvePoint, keygen::RoundCommitments, verify_signature, Error, Frame, Keyshare, Party,
    PartyId, Router, Signature,
};
use sha2::{Digest, Sha256};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Drive a batch of keygen parties through all four rounds
fn drive_keygen(mut parties: Vec<Party>) -> Vec<Keyshare> {
    let ids: Vec<PartyId> = parties.iter().map(|p| p.id()).collect();
    let router = Router::new(ids).expect("valid router");

    let round1: Vec<Frame> = parties
        .iter_mut()
        .map(|p| p.first_message().expect("round 1"))
        .collect();

    let mut round2 = Vec::new();
    for party in parties.iter_mut() {
        let inbound = router.inbound_for(party.id(), &round1);
        round2.extend(party.handle(&inbound).expect("round 2"));
    }

    let commitments: Vec<_> = parties
        .iter_mut()
        .map(|p| p.chain_code_commitment().expect("commitment"))
        .collect();

    let mut round3 = Vec::new();
    for party in parties.iter_mut() {
        let inbound = router.inbound_for(party.id(), &round2);
        let supplied = RoundCommitments::new(commitments.clone()).expect("commitments");
        round3.extend(
            party
                .handle_with_commitments(&inbound, supplied)
                .expect("round 3"),
        );
    }

    let mut round4 = Vec::new();
    for party in parties.iter_mut() {
        let inbound = router.inbound_for(party.id(), &round3);
        round4.extend(party.handle(&inbound).expect("round 4"));
    }

    for party in parties.iter_mut() {
        let inbound = router.inbound_for(party.id(), &round4);
        let out = party.handle(&inbound).expect("final round");
        assert!(out.is_empty());
    }

    parties
        .iter_mut()
        .map(|p| p.take_keyshare().expect("keyshare"))
        .collect()
}

fn run_keygen(n: usize, t: usize, ids: &[PartyId]) -> Vec<Keyshare> {
    let parties: Vec<Party> = ids
        .iter()
        .map(|&id| Party::new_keygen(n, t, id).expect("party"))
        .collect();
    drive_keygen(parties)
}

/// Drive the pre-signature rounds; returns the parties ready for the online
/// round
fn drive_presignature(shares: Vec<Keyshare>) -> Vec<Party> {
    let ids: Vec<PartyId> = shares.iter().map(|s| s.party_id).collect();
    let router = Router::new(ids).expect("valid router");
    let mut parties: Vec<Party> = shares
        .into_iter()
        .map(|share| Party::new_sign(share, "m").expect("sign party"))
        .collect();

    let round1: Vec<Frame> = parties
        .iter_mut()
        .map(|p| p.first_message().expect("round 1"))
        .collect();

    let mut round2 = Vec::new();
    for party in parties.iter_mut() {
        let inbound = router.inbound_for(party.id(), &round1);
        round2.extend(party.handle(&inbound).expect("round 2"));
    }

    let mut round3 = Vec::new();
    for party in parties.iter_mut() {
        let inbound = router.inbound_for(party.id(), &round2);
        round3.extend(party.handle(&inbound).expect("round 3"));
    }

    for party in parties.iter_mut() {
        let inbound = router.inbound_for(party.id(), &round3);
        let out = party.handle(&inbound).expect("pre-signature close");
        assert!(out.is_empty());
    }

    parties
}

/// Run the online round and combine on every party
fn drive_online(parties: &mut [Party], digest: &[u8; 32]) -> Vec<Signature> {
    let ids: Vec<PartyId> = parties.iter().map(|p| p.id()).collect();
    let router = Router::new(ids).expect("valid router");

    let online: Vec<Frame> = parties
        .iter_mut()
        .map(|p| p.last_message(digest).expect("online message"))
        .collect();

    parties
        .iter_mut()
        .map(|p| {
            let inbound = router.inbound_for(p.id(), &online);
            p.combine_signature(&inbound).expect("combine")
        })
        .collect()
}

fn sign_with(shares: Vec<Keyshare>, digest: &[u8; 32]) -> Vec<Signature> {
    let mut parties = drive_presignature(shares);
    drive_online(&mut parties, digest)
}

#[test]
fn keygen_2of3_then_sign() {
    init_tracing();
    let shares = run_keygen(3, 2, &[0, 1, 2]);
    assert_eq!(shares.len(), 3);

    let q = shares[0].public_key.clone();
    for share in &shares {
        assert_eq!(share.public_key, q);
        assert_eq!(share.chain_code, shares[0].chain_code);
        assert_eq!(share.key_id, shares[0].key_id);
    }

    let digest = [0u8; 32];
    let sigs = sign_with(vec![shares[0].clone(), shares[1].clone()], &digest);
    assert_eq!(sigs.len(), 2);
    assert_eq!(sigs[0], sigs[1]);
    assert!(verify_signature(&sigs[0].r, &sigs[0].s, &digest, &q).unwrap());
}

#[test]
fn signer_subset_equivalence() {
    init_tracing();
    let shares = run_keygen(3, 2, &[0, 1, 2]);
    let q = shares[0].public_key.clone();
    let digest: [u8; 32] = Sha256::digest(b"subset equivalence").into();

    for subset in [[0usize, 2], [1, 2]] {
        let picked: Vec<Keyshare> = subset
            .iter()
            .map(|&i| shares.iter().find(|s| s.party_id == i).unwrap().clone())
            .collect();
        let sigs = sign_with(picked, &digest);
        for sig in &sigs {
            assert!(verify_signature(&sig.r, &sig.s, &digest, &q).unwrap());
            assert!(sig.v <= 1);
        }
    }
}

#[test]
fn sparse_party_ids_agree() {
    init_tracing();
    let shares = run_keygen(3, 2, &[0, 2, 5]);
    let q = shares[0].public_key.clone();
    for share in &shares {
        assert_eq!(share.public_key, q);
    }
    let digest: [u8; 32] = Sha256::digest(b"sparse ids").into();
    let sigs = sign_with(vec![shares[1].clone(), shares[2].clone()], &digest);
    assert!(verify_signature(&sigs[0].r, &sigs[0].s, &digest, &q).unwrap());
}

#[test]
fn keygen_3of5_then_sign() {
    init_tracing();
    let shares = run_keygen(5, 3, &[0, 1, 2, 3, 4]);
    let q = shares[0].public_key.clone();
    for share in &shares {
        assert_eq!(share.public_key, q);
    }
    let digest: [u8; 32] = Sha256::digest(b"three of five").into();
    let picked = vec![shares[1].clone(), shares[3].clone(), shares[4].clone()];
    let sigs = sign_with(picked, &digest);
    assert_eq!(sigs.len(), 3);
    for sig in &sigs {
        assert_eq!((sig.r, sig.s), (sigs[0].r, sigs[0].s));
        assert!(verify_signature(&sig.r, &sig.s, &digest, &q).unwrap());
    }
}

#[test]
fn one_shot_enforcement() {
    init_tracing();
    let shares = run_keygen(3, 2, &[0, 1, 2]);
    let digest_a: [u8; 32] = Sha256::digest(b"digest a").into();
    let digest_b: [u8; 32] = Sha256::digest(b"digest b").into();

    let mut parties = drive_presignature(vec![shares[0].clone(), shares[1].clone()]);
    let sigs = drive_online(&mut parties, &digest_a);
    assert_eq!(sigs.len(), 2);

    // The pre-signature is spent: no second online message, no second
    // combine, under any digest.
    for party in parties.iter_mut() {
        assert!(matches!(
            party.last_message(&digest_b),
            Err(Error::SessionSpent)
        ));
        assert!(matches!(party.combine(&[]), Err(Error::SessionSpent)));
        assert!(matches!(party.first_message(), Err(Error::SessionSpent)));
    }
}

#[test]
fn last_message_requires_complete_presignature() {
    init_tracing();
    let shares = run_keygen(2, 2, &[0, 1]);
    let mut party = Party::new_sign(shares[0].clone(), "m").unwrap();
    let digest = [7u8; 32];
    assert!(matches!(
        party.last_message(&digest),
        Err(Error::SessionNotReady(_))
    ));
}

#[test]
fn digest_length_is_checked() {
    init_tracing();
    let shares = run_keygen(2, 2, &[0, 1]);
    let mut parties = drive_presignature(shares);
    assert!(matches!(
        parties[0].last_message(&[1u8; 31]),
        Err(Error::DigestLengthInvalid(31))
    ));
    // A rejected digest does not spend the session
    let digest = [1u8; 32];
    let sigs = drive_online(&mut parties, &digest);
    assert_eq!(sigs.len(), 2);
}

#[test]
fn derivation_path_must_be_identity() {
    init_tracing();
    let shares = run_keygen(2, 2, &[0, 1]);
    assert!(matches!(
        Party::new_sign(shares[0].clone(), "m/0/1"),
        Err(Error::DerivationUnsupported(_))
    ));
}

#[test]
fn recovery_id_parity_covers_both_values() {
    init_tracing();
    let shares = run_keygen(2, 2, &[0, 1]);
    let q = shares[0].public_key.clone();
    let digest: [u8; 32] = Sha256::digest(b"hello").into();

    let mut seen = [false, false];
    for _ in 0..32 {
        let sigs = sign_with(shares.clone(), &digest);
        let v = sigs[0].v;
        assert!(v <= 1);
        seen[v as usize] = true;

        let resolved =
            mpc_wallet_core::resolve_recovery_id(&sigs[0].r, &sigs[0].s, &digest, &q).unwrap();
        assert_eq!(resolved, v);
    }
    assert!(seen[0] && seen[1], "both recovery ids must occur");
}

#[test]
fn decompression_edge_cases() {
    // x = 1 lies on the curve (8 is a quadratic residue mod p)
    let mut x = [0u8; 32];
    x[31] = 1;
    let even = CurvePoint::decompress_with_parity(&x, false).unwrap();
    let compressed = even.compress().unwrap();
    assert_eq!(compressed[0], 0x02);
    let odd = CurvePoint::decompress_with_parity(&x, true).unwrap();
    assert_eq!(odd.compress().unwrap()[0], 0x03);

    // Some x in a small range must be a non-residue
    let mut rejected = false;
    for v in 1u8..=24 {
        let mut candidate = [0u8; 32];
        candidate[31] = v;
        if matches!(
            CurvePoint::decompress_with_parity(&candidate, false),
            Err(Error::PointInvalid)
        ) {
            rejected = true;
            break;
        }
    }
    assert!(rejected);
}

#[test]
fn keyshare_serialisation_round_trips() {
    init_tracing();
    let shares = run_keygen(2, 2, &[0, 1]);
    let bytes = shares[0].to_bytes().unwrap();
    let restored = Keyshare::from_bytes(&bytes).unwrap();
    assert_eq!(restored.to_bytes().unwrap(), bytes);
    assert_eq!(restored.commitment().unwrap(), shares[0].commitment().unwrap());

    let expected: [u8; 32] = Sha256::digest(&bytes).into();
    assert_eq!(shares[0].commitment().unwrap(), expected);

    // Distinct shares never share a serialisation
    assert_ne!(bytes, shares[1].to_bytes().unwrap());
}

#[test]
fn rotation_preserves_public_key() {
    init_tracing();
    let old_shares = run_keygen(3, 2, &[0, 1, 2]);
    let q = old_shares[0].public_key.clone();

    let rotation_parties: Vec<Party> = old_shares
        .iter()
        .map(|share| Party::new_rotation(share).expect("rotation party"))
        .collect();
    let mut new_shares = drive_keygen(rotation_parties);

    for (old, new) in old_shares.iter().zip(&new_shares) {
        assert_eq!(new.public_key, q);
        assert_eq!(new.chain_code, old.chain_code);
        assert_ne!(new.key_id, old.key_id);
        assert_ne!(new.to_bytes().unwrap(), old.to_bytes().unwrap());
    }

    // finish_rotation binds new to old; a share from another wallet or
    // another party is rejected
    let old0 = old_shares[0].clone();
    new_shares[0].finish_rotation(old0).unwrap();
    let unrelated = run_keygen(3, 2, &[0, 1, 2]);
    assert!(matches!(
        new_shares[1].finish_rotation(unrelated[1].clone()),
        Err(Error::RotationMismatch)
    ));
    assert!(matches!(
        new_shares[1].finish_rotation(old_shares[0].clone()),
        Err(Error::RotationMismatch)
    ));

    // New shares sign under the old public key
    let digest: [u8; 32] = Sha256::digest(b"rotated signing").into();
    let sigs = sign_with(vec![new_shares[0].clone(), new_shares[2].clone()], &digest);
    assert!(verify_signature(&sigs[0].r, &sigs[0].s, &digest, &q).unwrap());

    // Mixing an old share with a new one is detected in round 1
    let mut old_party = Party::new_sign(old_shares[1].clone(), "m").unwrap();
    let mut new_party = Party::new_sign(new_shares[1].clone(), "m").unwrap();
    let old_r1 = old_party.first_message().unwrap();
    let new_r1 = new_party.first_message().unwrap();
    assert!(matches!(
        new_party.handle(std::slice::from_ref(&old_r1)),
        Err(Error::RotationMismatch)
    ));
    assert!(matches!(
        old_party.handle(std::slice::from_ref(&new_r1)),
        Err(Error::RotationMismatch)
    ));
}

#[test]
fn keygen_rejects_wrong_round_frames() {
    init_tracing();
    let mut p0 = Party::new_keygen(2, 2, 0).unwrap();
    let mut p1 = Party::new_keygen(2, 2, 1).unwrap();
    let r1_a = p0.first_message().unwrap();
    let r1_b = p1.first_message().unwrap();

    let r2 = p0.handle(std::slice::from_ref(&r1_b)).unwrap();
    assert_eq!(r2.len(), 1);
    // A round 2 frame fed to a session still collecting round 1
    assert!(matches!(
        p1.handle(&r2),
        Err(Error::FrameForWrongRound { expected: 1, got: 2 })
    ));
    let _ = r1_a;
}

#[test]
fn keygen_rejects_duplicate_frames() {
    init_tracing();
    let mut p0 = Party::new_keygen(3, 2, 0).unwrap();
    let mut p1 = Party::new_keygen(3, 2, 1).unwrap();
    let _ = p0.first_message().unwrap();
    let r1 = p1.first_message().unwrap();
    assert!(matches!(
        p0.handle(&[r1.clone(), r1]),
        Err(Error::FrameDuplicate(1))
    ));
}

#[test]
fn frame_codec_survives_string_transport() {
    init_tracing();
    let mut p0 = Party::new_keygen(2, 2, 0).unwrap();
    let mut p1 = Party::new_keygen(2, 2, 1).unwrap();
    let r1_a = p0.first_message().unwrap();
    let r1_b = p1.first_message().unwrap();

    // Round-trip every frame through the base64 framing
    let via_text = |frame: &Frame| Frame::from_base64(&frame.to_base64().unwrap()).unwrap();
    let r2_a = p0.handle(&[via_text(&r1_b)]).unwrap();
    let r2_b = p1.handle(&[via_text(&r1_a)]).unwrap();
    assert_eq!(r2_a.len(), 1);
    assert_eq!(r2_b.len(), 1);
}
