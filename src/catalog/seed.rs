//! Built-in starter library used on first run or when `catalog.json` cannot
//! be read.

use super::model::{Dance, DanceElement, Difficulty};

fn element(id: &str, name: &str, description: &str, difficulty: Difficulty) -> DanceElement {
    DanceElement {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        difficulty,
        video: None,
    }
}

pub fn initial_dances() -> Vec<Dance> {
    use Difficulty::{Easy, Hard, Medium};

    vec![
        Dance {
            id: "salsa".into(),
            name: "Сальса".into(),
            elements: vec![
                element("salsa-1", "Основной шаг", "Базовое движение вперед и назад на 8 счетов.", Easy),
                element("salsa-2", "Поворот направо", "Поворот партнерши под рукой партнера.", Easy),
                element("salsa-3", "Кросс-боди лид", "Смена мест партнеров с ведением.", Medium),
                element("salsa-4", "Обратный поворот", "Поворот партнерши в обратную сторону.", Medium),
                element("salsa-5", "Сузи Кью", "Характерное движение стоп в сторону.", Hard),
            ],
        },
        Dance {
            id: "bachata".into(),
            name: "Бачата".into(),
            elements: vec![
                element("bachata-1", "Основной шаг", "Три шага в сторону и теп на 4-й счет.", Easy),
                element("bachata-2", "Поворот", "Простой поворот партнерши или партнера.", Easy),
                element("bachata-3", "Романтика", "Движение с волной корпуса.", Medium),
                element("bachata-4", "Смена мест", "Партнеры меняются местами.", Medium),
                element("bachata-5", "Слайд", "Скользящее движение ногой.", Easy),
            ],
        },
        Dance {
            id: "cha-cha-cha".into(),
            name: "Ча-ча-ча".into(),
            elements: vec![
                element("cha-1", "Шассе", "Быстрый тройной шаг \"ча-ча-ча\".", Easy),
                element("cha-2", "Нью-Йорк", "Открытие в сторону со скрестным шагом.", Medium),
                element("cha-3", "Тайм-степ", "Базовое движение на месте.", Easy),
                element("cha-4", "Рука к руке", "Партнеры расходятся и сходятся, держась за руки.", Medium),
                element("cha-5", "Спот-поворот", "Поворот на месте для партнерши и партнера.", Hard),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_has_three_dances_with_five_elements() {
        let dances = initial_dances();
        assert_eq!(dances.len(), 3);
        assert!(dances.iter().all(|d| d.elements.len() == 5));
        assert!(dances.iter().flat_map(|d| &d.elements).all(|e| e.video.is_none()));
    }
}
