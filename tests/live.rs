//! End-to-end checks against a populated CREDO database. Every test returns
//! early unless `CREDO_TEST_CONFIG` names a configuration file.

use std::path::PathBuf;

use credo::adaptor::{
    AdaptorOptions, ChemCompAdaptor, ContactAdaptor, FetchArgs, FragmentAdaptor, LigandAdaptor,
    PathOps, ResidueAdaptor, StructureAdaptor,
};
use credo::chem::{UsrParams, UsrWeights};
use credo::entity::residue::NO_INS_CODE;
use credo::entity::{Biomolecule, Ligand, Structure};
use credo::{Credo, CredoConfig};

const CONFIG_ENV: &str = "CREDO_TEST_CONFIG";

async fn connect() -> Option<Credo> {
    let path = PathBuf::from(std::env::var_os(CONFIG_ENV)?);
    let config = CredoConfig::load(&path).expect("test config");
    Some(Credo::connect(config).await.expect("connect"))
}

async fn structure_2p33(credo: &Credo) -> (Structure, Biomolecule) {
    let structure = StructureAdaptor::new(credo.clone())
        .fetch_by_pdb("2P33")
        .await
        .expect("query")
        .expect("2P33 present");
    let biomolecule = structure
        .biomolecules(credo)
        .await
        .expect("biomolecules")
        .into_iter()
        .next()
        .expect("at least one biomolecule");
    (structure, biomolecule)
}

async fn imatinib(credo: &Credo, biomolecule: &Biomolecule) -> Ligand {
    LigandAdaptor::new(credo.clone())
        .fetch_all_by_biomolecule_id(
            biomolecule.biomolecule_id,
            FetchArgs::from(Ligand::LIGAND_NAME.eq("STI")),
        )
        .await
        .expect("query")
        .collect(credo)
        .await
        .expect("ligands")
        .into_iter()
        .next()
        .expect("STI bound to 2P33")
}

#[tokio::test]
async fn structure_hierarchy_reaches_ser72() {
    let Some(credo) = connect().await else { return };
    let (_, biomolecule) = structure_2p33(&credo).await;

    let chains = biomolecule.chains_by_pdb_chain_id(&credo).await.expect("chains");
    let chain = chains.get("A").expect("chain A");
    let residue = chain
        .residue(&credo, 72, " ")
        .await
        .expect("query")
        .expect("residue 72");
    assert_eq!(residue.res_name, "SER");
    assert_eq!(residue.ins_code, NO_INS_CODE);
}

#[tokio::test]
async fn substructure_search_finds_kinase_inhibitors() {
    let Some(credo) = connect().await else { return };
    let Some(fetched) = ChemCompAdaptor::new(credo.clone())
        .fetch_all_by_substruct("c1cc(cnc1)c2ccncn2", FetchArgs::default())
        .await
        .expect("query")
    else {
        return;
    };
    let het_ids: Vec<String> = fetched
        .collect(&credo)
        .await
        .expect("rows")
        .into_iter()
        .map(|c| c.het_id)
        .collect();
    assert!(het_ids.iter().any(|h| h == "NIL"));
    assert!(het_ids.iter().any(|h| h == "STI"));
}

#[tokio::test]
async fn trigram_similarity_ranks_imatinib_first() {
    let Some(credo) = connect().await else { return };
    let smiles = "Cc1ccc(cc1Nc2nccc(n2)c3cccnc3)NC(=O)c4ccc(cc4)CN5CC[NH+](CC5)C";
    let Some(fetched) = ChemCompAdaptor::new(credo.clone())
        .fetch_all_by_trigram(smiles, 0.5, FetchArgs::default().limit(10))
        .await
        .expect("query")
    else {
        return;
    };
    let hits = fetched.collect(&credo).await.expect("rows");
    let top = hits.first().expect("at least one hit");
    assert_eq!(top.het_id, "STI");
    assert!(top.similarity >= 0.85, "similarity {}", top.similarity);
}

#[tokio::test]
async fn imatinib_shape_and_binding_site() {
    let Some(credo) = connect().await else { return };
    let (_, biomolecule) = structure_2p33(&credo).await;
    let ligand = imatinib(&credo, &biomolecule).await;

    let usr = ligand.usr(&credo).await.expect("query").expect("usr row");
    let self_similarity = usr
        .similarity_to(&usr, &UsrWeights::default())
        .expect("valid moments");
    assert!((self_similarity - 1.0).abs() < 1e-9);

    if let Some(fetched) = LigandAdaptor::new(credo.clone())
        .fetch_all_by_usr(
            usr.usr_space.lower(),
            &usr.usr_moments,
            UsrParams::default(),
            FetchArgs::default().limit(20),
        )
        .await
        .expect("query")
    {
        let hits = fetched.collect(&credo).await.expect("rows");
        let me = hits
            .iter()
            .find(|hit| hit.ligand_id == ligand.ligand_id)
            .expect("ligand matches its own shape");
        assert!((me.similarity - 1.0).abs() < 1e-6);
    }

    let sift = ligand.sift(&credo, FetchArgs::default()).await.expect("sift");
    assert!(!sift.is_empty());
    for row in &sift {
        let v = row.sift.to_array();
        assert_eq!(v.len(), 13);
        assert!(v.iter().all(|count| *count >= 0));
        assert!(row.sift.vdw + row.sift.proximal >= row.sift.hbond);
    }
}

#[tokio::test]
async fn fragment_leaves_are_terminal_descendants() {
    let Some(credo) = connect().await else { return };
    let fragments = FragmentAdaptor::new(credo.clone());
    let Some(root) = fragments
        .fetch_all_by_het_id("STI", FetchArgs::default())
        .await
        .expect("query")
        .collect(&credo)
        .await
        .expect("rows")
        .into_iter()
        .next()
    else {
        return;
    };

    let descendants = root.descendants(&credo).await.expect("descendants");
    let leaves = root.leaves(&credo).await.expect("leaves");
    for leaf in &leaves {
        assert!(leaf.is_terminal);
        assert!(descendants.contains(leaf));
    }
}

#[tokio::test]
async fn atom_contacts_stay_in_their_biomolecule() {
    let Some(credo) = connect().await else { return };
    let (_, biomolecule) = structure_2p33(&credo).await;
    let ligand = imatinib(&credo, &biomolecule).await;
    let atom = ligand
        .atoms(&credo, FetchArgs::default().limit(1))
        .await
        .expect("atoms")
        .into_iter()
        .next()
        .expect("ligand atom");

    let contacts = ContactAdaptor::new(credo.clone())
        .fetch_all_by_atom_id(atom.atom_id, biomolecule.biomolecule_id, FetchArgs::default())
        .await
        .expect("query")
        .collect(&credo)
        .await
        .expect("rows");
    assert!(!contacts.is_empty());
    for contact in &contacts {
        assert_eq!(contact.biomolecule_id, biomolecule.biomolecule_id);
        assert!(contact.atom_bgn_id == atom.atom_id || contact.atom_end_id == atom.atom_id);
    }
}

#[tokio::test]
async fn return_shapes_agree() {
    let Some(credo) = connect().await else { return };
    let (_, biomolecule) = structure_2p33(&credo).await;
    let id = biomolecule.biomolecule_id;

    let list = LigandAdaptor::new(credo.clone())
        .fetch_all_by_biomolecule_id(id, FetchArgs::default())
        .await
        .expect("list")
        .into_list()
        .expect("list shape");

    let query = LigandAdaptor::with_options(credo.clone(), AdaptorOptions::dynamic())
        .fetch_all_by_biomolecule_id(id, FetchArgs::default())
        .await
        .expect("handle")
        .into_query()
        .expect("query shape");
    assert_eq!(query.all(&credo).await.expect("rows"), list);

    let page = LigandAdaptor::with_options(credo.clone(), AdaptorOptions::paginated(1000))
        .fetch_all_by_biomolecule_id(id, FetchArgs::default())
        .await
        .expect("page")
        .into_page()
        .expect("page shape");
    assert_eq!(page.total as usize, list.len());
}

#[tokio::test]
async fn glob_match_covers_path_descendants() {
    let Some(credo) = connect().await else { return };
    let (structure, _) = structure_2p33(&credo).await;
    let adaptor = ResidueAdaptor::new(credo.clone());
    let prefix = format!("{}/1/A", structure.pdb);

    let Some(descendants) = adaptor
        .fetch_all_path_descendants(&prefix, FetchArgs::default())
        .await
        .expect("descendants")
    else {
        return;
    };
    let descendants = descendants.collect(&credo).await.expect("rows");
    let matched = adaptor
        .fetch_all_by_path_match(&format!("{prefix}/*"), FetchArgs::default())
        .await
        .expect("match")
        .expect("ptree available")
        .collect(&credo)
        .await
        .expect("rows");
    for residue in &descendants {
        assert!(matched.contains(residue));
    }
}
