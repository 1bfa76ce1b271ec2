mod common;

use std::rc::Rc;

use common::{Course, Student, count_rows, in_transaction, integers, session};
use relorm::prelude::*;

fn course(title: &str) -> Handle<Course> {
    Course {
        title: title.to_string(),
        ..Default::default()
    }
    .into_handle()
}

fn enrolled(name: &str, courses: &[Handle<Course>]) -> Handle<Student> {
    let mut student = Student {
        name: name.to_string(),
        ..Default::default()
    };
    student.courses.set(courses.to_vec());
    student.into_handle()
}

fn course_ids_of(session: &Session, student: &Handle<Student>) -> Vec<i64> {
    let id = student.borrow().id.unwrap();
    integers(
        session,
        &format!("SELECT course_id FROM enrollment WHERE student_id = {id} ORDER BY course_id"),
    )
}

#[test]
fn sqlite_save_writes_one_join_row_per_partner() {
    let (session, log) = session();
    let (p1, p2) = (course("Algebra"), course("Topology"));
    let student = enrolled("Emmy", &[p1.clone(), p2.clone()]);

    assert!(in_transaction(&session, || session.save(&student)));
    assert_eq!(
        log.take(),
        vec![
            "INSERT INTO student (name) VALUES ('Emmy')",
            "INSERT INTO course (title) VALUES ('Algebra')",
            "INSERT INTO course (title) VALUES ('Topology')",
            "INSERT INTO enrollment (student_id, course_id) VALUES (1, 1)",
            "INSERT INTO enrollment (student_id, course_id) VALUES (1, 2)",
        ]
    );
    assert_eq!(course_ids_of(&session, &student), vec![1, 2]);
}

#[test]
fn sqlite_update_removes_dropped_partners() {
    let (session, _log) = session();
    let (p1, p2) = (course("Algebra"), course("Topology"));
    let student = enrolled("Emmy", &[p1.clone(), p2.clone()]);
    in_transaction(&session, || session.save(&student));

    student.borrow_mut().courses.set(vec![p2.clone()]);
    assert!(in_transaction(&session, || session.update(&student)));

    let p2_id = p2.borrow().id.unwrap();
    assert_eq!(course_ids_of(&session, &student), vec![p2_id]);

    session.recycle_cache();
    let id = student.borrow().id;
    let fresh = session.load::<Student>(id).unwrap().unwrap();
    let titles: Vec<String> = fresh
        .borrow()
        .courses
        .get()
        .unwrap()
        .iter()
        .map(|c| c.borrow().title.clone())
        .collect();
    assert_eq!(titles, vec!["Topology"]);
}

#[test]
fn sqlite_update_to_empty_collection_removes_every_link() {
    let (session, log) = session();
    let p1 = course("Algebra");
    let student = enrolled("Emmy", &[p1]);
    in_transaction(&session, || session.save(&student));

    student.borrow_mut().courses.set(Vec::new());
    log.clear();
    assert!(in_transaction(&session, || session.update(&student)));

    assert_eq!(
        log.take(),
        vec![
            "UPDATE student SET name = 'Emmy' WHERE id = 1",
            "DELETE FROM enrollment WHERE student_id = 1",
        ]
    );
    assert_eq!(count_rows(&session, "enrollment"), 0);
    assert_eq!(count_rows(&session, "course"), 1);
}

#[test]
fn sqlite_links_mapped_from_both_sides_survive_resaves() {
    let (session, _log) = session();
    let shared = course("Logic");
    let emmy = enrolled("Emmy", &[shared.clone()]);
    let kurt = enrolled("Kurt", &[shared.clone()]);
    shared
        .borrow_mut()
        .students
        .set(vec![emmy.clone(), kurt.clone()]);

    assert_eq!(
        in_transaction(&session, || session.save_all(&[emmy.clone(), kurt.clone()])),
        2
    );
    assert_eq!(count_rows(&session, "student"), 2);
    assert_eq!(count_rows(&session, "course"), 1);
    assert_eq!(count_rows(&session, "enrollment"), 2);

    assert!(in_transaction(&session, || session.save(&shared)));
    assert_eq!(count_rows(&session, "enrollment"), 2);
}

#[test]
fn sqlite_eager_cycle_resolves_to_the_same_instances() {
    let (session, _log) = session();
    let p1 = course("Algebra");
    let student = enrolled("Emmy", &[p1]);
    in_transaction(&session, || session.save(&student));
    session.recycle_cache();

    let id = student.borrow().id;
    let loaded = session.load::<Student>(id).unwrap().unwrap();
    let courses = loaded.borrow().courses.get().unwrap().clone();
    assert_eq!(courses.len(), 1);

    let back = courses[0].borrow().students.get().unwrap().clone();
    assert_eq!(back.len(), 1);
    assert!(Rc::ptr_eq(&back[0], &loaded));

    let again = session.load::<Student>(id).unwrap().unwrap();
    assert!(Rc::ptr_eq(&again, &loaded));
}
